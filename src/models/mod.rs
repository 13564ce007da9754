pub mod answer;
pub mod category;
pub mod license_type;
pub mod question;
pub mod test_configuration;
pub mod test_session;
pub mod test_status;
pub mod test_template;
pub mod user;
pub mod user_progress;
