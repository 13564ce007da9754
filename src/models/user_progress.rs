use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-category learning counters for one profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CategoryProgress {
    pub category_id: i32,
    pub category_name: String,
    pub total_questions: i64,
    pub answered: i64,
    pub mastered: i64,
    pub bookmarked: i64,
}
