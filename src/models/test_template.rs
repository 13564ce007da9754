use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::test_configuration::TestConfiguration;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TestTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub license_type_id: Option<i32>,
    pub configuration: Json<TestConfiguration>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
