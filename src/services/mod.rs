pub mod auth_service;
pub mod progress_service;
pub mod question_service;
pub mod scoring_service;
pub mod session_service;
