use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::answer::Answer;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: i64,
    pub category_id: i32,
    pub text: String,
    pub explanation: Option<String>,
    pub image_path: Option<String>,
    pub is_short_image: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoadSign {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub image_path: Option<String>,
}

/// A question with its ordered answers and referenced road signs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDetails {
    #[serde(flatten)]
    pub question: Question,
    pub answers: Vec<Answer>,
    pub road_signs: Vec<RoadSign>,
}

impl QuestionDetails {
    pub fn correct_answer_id(&self) -> Option<i64> {
        self.answers.iter().find(|a| a.is_correct).map(|a| a.id)
    }
}
