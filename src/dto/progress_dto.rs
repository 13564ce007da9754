use serde::{Deserialize, Serialize};

use crate::models::user_progress::CategoryProgress;

#[derive(Debug, Clone, Deserialize)]
pub struct BookmarkRequest {
    /// Explicit state; toggles when absent.
    pub bookmarked: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookmarkResponse {
    pub question_id: i64,
    pub is_bookmarked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressOverview {
    pub categories: Vec<CategoryProgress>,
    pub total_questions: i64,
    pub answered: i64,
    pub mastered: i64,
    pub bookmarked: i64,
}

impl ProgressOverview {
    pub fn from_categories(categories: Vec<CategoryProgress>) -> Self {
        let sum = |f: fn(&CategoryProgress) -> i64| categories.iter().map(f).sum::<i64>();
        Self {
            total_questions: sum(|c| c.total_questions),
            answered: sum(|c| c.answered),
            mastered: sum(|c| c.mastered),
            bookmarked: sum(|c| c.bookmarked),
            categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overview_sums_categories() {
        let cat = |id, total, answered, mastered, bookmarked| CategoryProgress {
            category_id: id,
            category_name: format!("c{}", id),
            total_questions: total,
            answered,
            mastered,
            bookmarked,
        };
        let overview = ProgressOverview::from_categories(vec![cat(1, 10, 4, 2, 1), cat(2, 5, 5, 5, 0)]);
        assert_eq!(overview.total_questions, 15);
        assert_eq!(overview.answered, 9);
        assert_eq!(overview.mastered, 7);
        assert_eq!(overview.bookmarked, 1);
        assert_eq!(overview.categories.len(), 2);
    }
}
