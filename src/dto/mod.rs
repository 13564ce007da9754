pub mod auth_dto;
pub mod progress_dto;
pub mod question_dto;
pub mod session_dto;
