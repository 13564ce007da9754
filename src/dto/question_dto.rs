use serde::{Deserialize, Serialize};

use crate::models::question::Question;

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionQuery {
    pub category_id: Option<i32>,
    pub license_type_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedQuestions {
    pub items: Vec<Question>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}
