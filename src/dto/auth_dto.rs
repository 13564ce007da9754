use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::user::User;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,
    pub default_license_type_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectProfileRequest {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub name: String,
    pub has_password: bool,
    pub default_license_type_id: Option<i32>,
}

impl From<&User> for ProfileSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            has_password: user.has_password(),
            default_license_type_id: user.default_license_type_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub profile: ProfileSummary,
}
