use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::answer::Answer;
use crate::models::question::{QuestionDetails, RoadSign};
use crate::models::test_configuration::{TestConfiguration, TestKind};
use crate::models::test_session::{StepOutcome, TestSession, TimeTaken};
use crate::models::test_status::TestStatus;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSessionRequest {
    pub template_id: Option<Uuid>,
    pub license_type_id: Option<i32>,
    pub test_kind: Option<TestKind>,
    #[validate(range(min = 5, max = 1000, message = "question_count must be between 5 and 1000"))]
    pub question_count: Option<u32>,
    #[validate(range(min = 30, max = 180, message = "time_per_question must be between 30 and 180 seconds"))]
    pub time_per_question: Option<u32>,
    #[validate(range(min = 1, max = 50, message = "failure_threshold must be between 1 and 50 percent"))]
    pub failure_threshold: Option<u32>,
    pub category_ids: Option<Vec<i32>>,
    pub auto_advance: Option<bool>,
}

impl CreateSessionRequest {
    pub fn from_configuration(cfg: &TestConfiguration) -> Self {
        Self {
            template_id: None,
            license_type_id: None,
            test_kind: Some(cfg.test_kind),
            question_count: cfg.question_count,
            time_per_question: cfg.time_per_question,
            failure_threshold: Some(cfg.failure_threshold),
            category_ids: Some(cfg.category_ids.clone()),
            auto_advance: Some(cfg.auto_advance),
        }
    }

    /// Builds the stored configuration; every numeric setting is required.
    pub fn to_configuration(&self) -> Result<TestConfiguration> {
        let missing = |field: &str| Error::BadRequest(format!("{} is required", field));
        Ok(TestConfiguration {
            test_kind: self.test_kind.unwrap_or_default(),
            question_count: Some(self.question_count.ok_or_else(|| missing("question_count"))?),
            time_per_question: Some(
                self.time_per_question
                    .ok_or_else(|| missing("time_per_question"))?,
            ),
            failure_threshold: self
                .failure_threshold
                .ok_or_else(|| missing("failure_threshold"))?,
            category_ids: self.category_ids.clone().unwrap_or_default(),
            auto_advance: self.auto_advance.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub question_id: i64,
    pub answer_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipRequest {
    pub question_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateRequest {
    pub index: i32,
}

/// Question as shown while the session is running: no explanation and no
/// correctness flags until it has been answered.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentQuestion {
    pub id: i64,
    pub category_id: i32,
    pub text: String,
    pub image_path: Option<String>,
    pub is_short_image: bool,
    pub answers: Vec<Answer>,
    pub road_signs: Vec<RoadSign>,
}

impl From<QuestionDetails> for CurrentQuestion {
    fn from(details: QuestionDetails) -> Self {
        let q = details.question;
        Self {
            id: q.id,
            category_id: q.category_id,
            text: q.text,
            image_path: q.image_path,
            is_short_image: q.is_short_image,
            answers: details.answers,
            road_signs: details.road_signs,
        }
    }
}

/// Client view of a session at `now`. The paper travels as question ids only
/// and given answers as the ids of answered questions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub test_template_id: Option<Uuid>,
    pub license_type_id: Option<i32>,
    pub test_kind: TestKind,
    pub status: TestStatus,
    pub total_questions: i32,
    pub current_question_index: i32,
    pub question_ids: Vec<i64>,
    pub answered_question_ids: Vec<i64>,
    pub skipped_question_ids: Vec<i64>,
    pub correct_count: i32,
    pub wrong_count: i32,
    pub failure_threshold: u32,
    pub allowed_mistakes: i64,
    pub answered_count: usize,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub remaining_time_seconds: Option<i64>,
    pub time_taken_seconds: Option<i64>,
    pub score_percentage: Option<Decimal>,
    pub time_remaining: i64,
    pub progress_percentage: f64,
    pub is_overtime: bool,
    pub time_taken: Option<TimeTaken>,
    pub is_active: bool,
    pub has_result: bool,
    pub is_finished: bool,
    pub current_question: Option<CurrentQuestion>,
}

impl SessionView {
    pub fn build(
        session: &TestSession,
        now: DateTime<Utc>,
        current_question: Option<QuestionDetails>,
    ) -> Self {
        Self {
            id: session.id,
            test_template_id: session.test_template_id,
            license_type_id: session.license_type_id,
            test_kind: session.configuration.test_kind,
            status: session.status,
            total_questions: session.total_questions,
            current_question_index: session.current_question_index,
            question_ids: session.questions.iter().map(|q| q.question_id).collect(),
            answered_question_ids: session.answers_given.keys().copied().collect(),
            skipped_question_ids: session.skipped_question_ids.iter().copied().collect(),
            correct_count: session.correct_count,
            wrong_count: session.wrong_count,
            failure_threshold: session.configuration.failure_threshold,
            allowed_mistakes: session.allowed_mistakes(),
            answered_count: session.answered_count(),
            started_at: session.started_at,
            paused_at: session.paused_at,
            finished_at: session.finished_at,
            remaining_time_seconds: session.remaining_time_seconds,
            time_taken_seconds: session.time_taken_seconds,
            score_percentage: session.score_percentage,
            time_remaining: session.time_remaining(now),
            progress_percentage: session.progress_percentage(),
            is_overtime: session.is_overtime(),
            time_taken: session.time_taken(),
            is_active: session.status.is_active(),
            has_result: session.status.has_result(),
            is_finished: session.status.is_finished(),
            current_question: current_question.map(CurrentQuestion::from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResult {
    Applied,
    Expired,
}

impl From<StepOutcome> for StepResult {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Applied => StepResult::Applied,
            StepOutcome::Expired => StepResult::Expired,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub result: StepResult,
    pub is_correct: Option<bool>,
    pub correct_answer_id: Option<i64>,
    pub explanation: Option<String>,
    pub session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResponse {
    pub result: StepResult,
    pub session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbandonResponse {
    pub abandoned: bool,
    pub session: SessionView,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub status: Option<TestStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// History row without the paper and answers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub test_template_id: Option<Uuid>,
    pub license_type_id: Option<i32>,
    pub test_kind: TestKind,
    pub status: TestStatus,
    pub total_questions: i32,
    pub correct_count: i32,
    pub wrong_count: i32,
    pub score_percentage: Option<Decimal>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub time_taken_seconds: Option<i64>,
    pub is_overtime: bool,
}

impl From<&TestSession> for SessionSummary {
    fn from(s: &TestSession) -> Self {
        Self {
            id: s.id,
            test_template_id: s.test_template_id,
            license_type_id: s.license_type_id,
            test_kind: s.configuration.test_kind,
            status: s.status,
            total_questions: s.total_questions,
            correct_count: s.correct_count,
            wrong_count: s.wrong_count,
            score_percentage: s.score_percentage,
            started_at: s.started_at,
            finished_at: s.finished_at,
            time_taken_seconds: s.time_taken_seconds,
            is_overtime: s.is_overtime(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedSessions {
    pub items: Vec<SessionSummary>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct SessionStats {
    pub total: i64,
    pub by_status: HashMap<String, i64>,
    pub average_score: Option<Decimal>,
    pub pass_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Question;
    use crate::models::test_session::PaperQuestion;

    fn request() -> CreateSessionRequest {
        CreateSessionRequest {
            template_id: None,
            license_type_id: Some(2),
            test_kind: None,
            question_count: Some(20),
            time_per_question: Some(60),
            failure_threshold: Some(10),
            category_ids: None,
            auto_advance: None,
        }
    }

    #[test]
    fn accepts_configuration_within_limits() {
        let req = request();
        assert!(req.validate().is_ok());
        let cfg = req.to_configuration().unwrap();
        assert_eq!(cfg.question_count, Some(20));
        assert_eq!(cfg.test_kind, TestKind::Topic);
        assert!(cfg.auto_advance);
    }

    #[test]
    fn rejects_out_of_range_settings() {
        let mut req = request();
        req.question_count = Some(4);
        assert!(req.validate().is_err());

        let mut req = request();
        req.time_per_question = Some(181);
        assert!(req.validate().is_err());

        let mut req = request();
        req.failure_threshold = Some(0);
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("failure_threshold"));
    }

    fn running_session() -> TestSession {
        let paper = vec![
            PaperQuestion {
                question_id: 7,
                answer_ids: vec![70, 71],
            },
            PaperQuestion {
                question_id: 8,
                answer_ids: vec![80, 81],
            },
        ];
        let mut session = TestSession::new(
            Uuid::new_v4(),
            None,
            Some(2),
            request().to_configuration().unwrap(),
            paper,
            Utc::now(),
        );
        session.answer(7, 71, false, session.started_at).unwrap();
        session
    }

    fn details(id: i64) -> QuestionDetails {
        QuestionDetails {
            question: Question {
                id,
                category_id: 1,
                text: "Who has priority?".into(),
                explanation: Some("The tram does.".into()),
                image_path: None,
                is_short_image: false,
                is_active: true,
                created_at: Utc::now(),
            },
            answers: vec![
                Answer {
                    id: id * 10,
                    question_id: id,
                    text: "Tram".into(),
                    position: 1,
                    is_correct: true,
                },
                Answer {
                    id: id * 10 + 1,
                    question_id: id,
                    text: "Car".into(),
                    position: 2,
                    is_correct: false,
                },
            ],
            road_signs: vec![],
        }
    }

    #[test]
    fn current_question_hides_explanation_and_correct_flags() {
        let session = running_session();
        let view = SessionView::build(&session, session.started_at, Some(details(8)));
        let json = serde_json::to_value(&view).unwrap();
        let current = &json["current_question"];
        assert_eq!(current["id"], 8);
        assert!(current.get("explanation").is_none());
        assert_eq!(current["answers"].as_array().map(Vec::len), Some(2));
        assert!(current["answers"][0].get("is_correct").is_none());
    }

    #[test]
    fn view_leaves_out_paper_answers_and_given_answers() {
        let session = running_session();
        let view = SessionView::build(&session, session.started_at, None);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("questions").is_none());
        assert!(json.get("answers_given").is_none());
        assert!(json.get("configuration").is_none());
        assert_eq!(json["question_ids"], serde_json::json!([7, 8]));
        assert_eq!(json["answered_question_ids"], serde_json::json!([7]));
        assert_eq!(json["wrong_count"], 1);
        assert_eq!(json["allowed_mistakes"], 2);
        assert_eq!(json["time_remaining"], 1200);
        assert_eq!(json["status"], "in_progress");
    }

    #[test]
    fn missing_settings_are_bad_requests() {
        let mut req = request();
        req.time_per_question = None;
        assert!(req.validate().is_ok());
        assert!(matches!(req.to_configuration(), Err(Error::BadRequest(_))));
    }
}
