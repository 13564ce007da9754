pub mod health;
pub mod profiles;
pub mod progress;
pub mod questions;
pub mod sessions;
