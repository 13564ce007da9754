use serde::{Deserialize, Serialize};

pub const DEFAULT_QUESTION_COUNT: u32 = 30;
pub const DEFAULT_TIME_PER_QUESTION: u32 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Questions drawn from the bank, optionally filtered by category.
    #[default]
    Topic,
    /// Only questions the user has bookmarked.
    Bookmarked,
}

/// Settings a session is started with. Immutable once the session exists.
///
/// `question_count` and `time_per_question` are optional only so that rows
/// written without them still load; new sessions always carry both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfiguration {
    #[serde(default)]
    pub test_kind: TestKind,
    #[serde(default)]
    pub question_count: Option<u32>,
    #[serde(default)]
    pub time_per_question: Option<u32>,
    pub failure_threshold: u32,
    #[serde(default)]
    pub category_ids: Vec<i32>,
    #[serde(default)]
    pub auto_advance: bool,
}

impl TestConfiguration {
    pub fn effective_question_count(&self) -> u32 {
        self.question_count.unwrap_or_else(|| {
            tracing::warn!(
                default = DEFAULT_QUESTION_COUNT,
                "test configuration without question_count, falling back to default"
            );
            DEFAULT_QUESTION_COUNT
        })
    }

    pub fn effective_time_per_question(&self) -> u32 {
        self.time_per_question.unwrap_or_else(|| {
            tracing::warn!(
                default = DEFAULT_TIME_PER_QUESTION,
                "test configuration without time_per_question, falling back to default"
            );
            DEFAULT_TIME_PER_QUESTION
        })
    }

    /// Whole test duration in seconds.
    pub fn total_duration_seconds(&self) -> i64 {
        i64::from(self.effective_question_count()) * i64::from(self.effective_time_per_question())
    }

    /// Wrong answers tolerated before the session fails.
    pub fn allowed_mistakes(&self) -> i64 {
        i64::from(self.effective_question_count()) * i64::from(self.failure_threshold) / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(question_count: Option<u32>, time_per_question: Option<u32>, threshold: u32) -> TestConfiguration {
        TestConfiguration {
            test_kind: TestKind::Topic,
            question_count,
            time_per_question,
            failure_threshold: threshold,
            category_ids: vec![],
            auto_advance: true,
        }
    }

    #[test]
    fn allowed_mistakes_rounds_down() {
        assert_eq!(config(Some(20), Some(60), 10).allowed_mistakes(), 2);
        assert_eq!(config(Some(25), Some(60), 10).allowed_mistakes(), 2);
        assert_eq!(config(Some(5), Some(60), 1).allowed_mistakes(), 0);
    }

    #[test]
    fn missing_fields_use_legacy_defaults() {
        let cfg: TestConfiguration = serde_json::from_str(r#"{"failure_threshold": 10}"#).unwrap();
        assert_eq!(cfg.test_kind, TestKind::Topic);
        assert_eq!(cfg.total_duration_seconds(), 30 * 60);
        assert_eq!(cfg.allowed_mistakes(), 3);
    }

    #[test]
    fn total_duration_multiplies_count_and_time() {
        assert_eq!(config(Some(10), Some(60), 10).total_duration_seconds(), 600);
        assert_eq!(config(Some(10), None, 10).total_duration_seconds(), 600);
        assert_eq!(config(None, Some(30), 10).total_duration_seconds(), 900);
    }
}
