use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::test_configuration::TestConfiguration;
use crate::models::test_status::TestStatus;

/// One question on the paper with its answer ids in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperQuestion {
    pub question_id: i64,
    pub answer_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GivenAnswer {
    pub answer_id: i64,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// Result of a mutation that may find the clock already ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    /// Time was up; the session was finalized instead.
    Expired,
}

/// Explicit view over the sign-encoded `time_taken_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeTaken {
    pub seconds: u64,
    pub overtime: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_template_id: Option<Uuid>,
    pub license_type_id: Option<i32>,
    pub configuration: TestConfiguration,
    pub questions: Vec<PaperQuestion>,
    pub current_question_index: i32,
    pub answers_given: BTreeMap<i64, GivenAnswer>,
    pub skipped_question_ids: BTreeSet<i64>,
    pub correct_count: i32,
    pub wrong_count: i32,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub remaining_time_seconds: Option<i64>,
    pub finished_at: Option<DateTime<Utc>>,
    pub time_taken_seconds: Option<i64>,
    pub status: TestStatus,
    pub total_questions: i32,
    pub score_percentage: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestSession {
    pub fn new(
        user_id: Uuid,
        test_template_id: Option<Uuid>,
        license_type_id: Option<i32>,
        configuration: TestConfiguration,
        questions: Vec<PaperQuestion>,
        now: DateTime<Utc>,
    ) -> Self {
        let total_questions = questions.len() as i32;
        Self {
            id: Uuid::new_v4(),
            user_id,
            test_template_id,
            license_type_id,
            configuration,
            questions,
            current_question_index: 0,
            answers_given: BTreeMap::new(),
            skipped_question_ids: BTreeSet::new(),
            correct_count: 0,
            wrong_count: 0,
            started_at: now,
            paused_at: None,
            remaining_time_seconds: None,
            finished_at: None,
            time_taken_seconds: None,
            status: TestStatus::InProgress,
            total_questions,
            score_percentage: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn configured_total_duration(&self) -> i64 {
        self.configuration.total_duration_seconds()
    }

    pub fn allowed_mistakes(&self) -> i64 {
        self.configuration.allowed_mistakes()
    }

    pub fn threshold_breached(&self) -> bool {
        i64::from(self.wrong_count) > self.allowed_mistakes()
    }

    pub fn answered_count(&self) -> usize {
        self.answers_given.len()
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.total_questions <= 0 {
            return 0.0;
        }
        self.answered_count() as f64 / f64::from(self.total_questions) * 100.0
    }

    /// Seconds left on the clock; negative once the test ran over.
    ///
    /// A stored snapshot wins over the value derived from `started_at`.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> i64 {
        match self.remaining_time_seconds {
            Some(snapshot) => snapshot,
            None => self.configured_total_duration() - (now - self.started_at).num_seconds(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == TestStatus::InProgress && self.time_remaining(now) <= 0
    }

    /// Negative `time_taken_seconds` marks a session that ran past its duration.
    pub fn is_overtime(&self) -> bool {
        self.time_taken_seconds.is_some_and(|taken| taken < 0)
    }

    pub fn time_taken(&self) -> Option<TimeTaken> {
        self.time_taken_seconds.map(|taken| {
            if taken < 0 {
                TimeTaken {
                    seconds: (self.configured_total_duration() - taken).unsigned_abs(),
                    overtime: true,
                }
            } else {
                TimeTaken {
                    seconds: taken.unsigned_abs(),
                    overtime: false,
                }
            }
        })
    }

    pub fn current_question(&self) -> Option<&PaperQuestion> {
        usize::try_from(self.current_question_index)
            .ok()
            .and_then(|idx| self.questions.get(idx))
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<StepOutcome> {
        self.ensure_in_progress()?;
        if self.expire_if_due(now) {
            return Ok(StepOutcome::Expired);
        }
        self.remaining_time_seconds = Some(self.time_remaining(now));
        self.paused_at = Some(now);
        self.status = TestStatus::Paused;
        self.updated_at = now;
        Ok(StepOutcome::Applied)
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != TestStatus::Paused {
            return Err(Error::Conflict(format!(
                "Cannot resume a test with status '{}'",
                self.status
            )));
        }
        let remaining = self.time_remaining(now);
        let elapsed = self.configured_total_duration() - remaining;
        self.started_at = now - chrono::Duration::seconds(elapsed);
        self.remaining_time_seconds = None;
        self.paused_at = None;
        self.status = TestStatus::InProgress;
        self.updated_at = now;
        Ok(())
    }

    /// Records an answer whose correctness the caller looked up.
    pub fn answer(
        &mut self,
        question_id: i64,
        answer_id: i64,
        is_correct: bool,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome> {
        self.ensure_in_progress()?;
        if self.expire_if_due(now) {
            return Ok(StepOutcome::Expired);
        }
        let position = self.open_position(question_id)?;
        if !self.questions[position].answer_ids.contains(&answer_id) {
            return Err(Error::BadRequest(format!(
                "Answer {} does not belong to question {}",
                answer_id, question_id
            )));
        }

        self.answers_given.insert(
            question_id,
            GivenAnswer {
                answer_id,
                is_correct,
                answered_at: now,
            },
        );
        self.skipped_question_ids.remove(&question_id);
        if is_correct {
            self.correct_count += 1;
        } else {
            self.wrong_count += 1;
        }
        self.updated_at = now;

        if self.threshold_breached() {
            self.finalize(TestStatus::Failed, now);
        } else if self.unanswered_count() == 0 {
            let outcome = self.outcome();
            self.finalize(outcome, now);
        } else if self.configuration.auto_advance {
            if let Some(next) = self.next_open_index(position) {
                self.current_question_index = next as i32;
            }
        }
        Ok(StepOutcome::Applied)
    }

    pub fn skip(&mut self, question_id: i64, now: DateTime<Utc>) -> Result<StepOutcome> {
        self.ensure_in_progress()?;
        if self.expire_if_due(now) {
            return Ok(StepOutcome::Expired);
        }
        let position = self.open_position(question_id)?;
        self.skipped_question_ids.insert(question_id);
        if let Some(next) = self.next_open_index(position) {
            self.current_question_index = next as i32;
        }
        self.updated_at = now;
        Ok(StepOutcome::Applied)
    }

    pub fn navigate(&mut self, index: i32, now: DateTime<Utc>) -> Result<StepOutcome> {
        self.ensure_in_progress()?;
        if self.expire_if_due(now) {
            return Ok(StepOutcome::Expired);
        }
        if index < 0 || index >= self.total_questions {
            return Err(Error::BadRequest(format!(
                "Question index {} is out of range 0..{}",
                index, self.total_questions
            )));
        }
        self.current_question_index = index;
        self.updated_at = now;
        Ok(StepOutcome::Applied)
    }

    /// Ends an in-progress session with the outcome its answers earned.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<TestStatus> {
        self.ensure_in_progress()?;
        if self.expire_if_due(now) {
            return Ok(self.status);
        }
        let outcome = self.outcome();
        self.finalize(outcome, now);
        Ok(outcome)
    }

    /// Returns `false` and leaves the session untouched unless it is active.
    pub fn abandon(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.is_active() {
            return false;
        }
        self.finalize(TestStatus::Abandoned, now);
        true
    }

    /// Finalizes an in-progress session whose clock has run out.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_expired(now) {
            return false;
        }
        let outcome = self.outcome();
        self.finalize(outcome, now);
        true
    }

    fn outcome(&self) -> TestStatus {
        if self.threshold_breached() {
            TestStatus::Failed
        } else if self.total_questions > 0 && self.unanswered_count() == 0 {
            TestStatus::Passed
        } else {
            TestStatus::Completed
        }
    }

    /// Closes the session. Finishing or expiring past the deadline stores the
    /// negative remaining time as `time_taken_seconds`; abandoning always
    /// stores `total - remaining`.
    fn finalize(&mut self, status: TestStatus, now: DateTime<Utc>) {
        let remaining = self.time_remaining(now);
        self.time_taken_seconds = Some(if remaining >= 0 || status == TestStatus::Abandoned {
            self.configured_total_duration() - remaining
        } else {
            remaining
        });
        self.remaining_time_seconds = Some(remaining);
        self.score_percentage = Some(self.score());
        self.paused_at = None;
        self.finished_at = Some(now);
        self.status = status;
        self.updated_at = now;
    }

    fn score(&self) -> Decimal {
        if self.total_questions <= 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.correct_count) * Decimal::ONE_HUNDRED
            / Decimal::from(self.total_questions))
        .round_dp(2)
    }

    fn ensure_in_progress(&self) -> Result<()> {
        if self.status == TestStatus::InProgress {
            Ok(())
        } else {
            Err(Error::Conflict(format!(
                "Test is not in progress (status '{}')",
                self.status
            )))
        }
    }

    /// Paper position of a question that has not been answered yet.
    fn open_position(&self, question_id: i64) -> Result<usize> {
        let position = self
            .questions
            .iter()
            .position(|q| q.question_id == question_id)
            .ok_or_else(|| {
                Error::BadRequest(format!("Question {} is not part of this test", question_id))
            })?;
        if self.answers_given.contains_key(&question_id) {
            return Err(Error::Conflict(format!(
                "Question {} has already been answered",
                question_id
            )));
        }
        Ok(position)
    }

    fn unanswered_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| !self.answers_given.contains_key(&q.question_id))
            .count()
    }

    /// Next unanswered question after `from`, wrapping around. Questions never
    /// skipped come first; skipped ones are revisited once those run out.
    fn next_open_index(&self, from: usize) -> Option<usize> {
        let len = self.questions.len();
        let open: Vec<usize> = (1..=len)
            .map(|step| (from + step) % len)
            .filter(|&idx| !self.answers_given.contains_key(&self.questions[idx].question_id))
            .collect();
        open.iter()
            .copied()
            .find(|&idx| !self.skipped_question_ids.contains(&self.questions[idx].question_id))
            .or_else(|| open.first().copied())
    }
}

/// Row shape of `test_sessions`.
#[derive(Debug, Clone, FromRow)]
pub struct TestSessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_template_id: Option<Uuid>,
    pub license_type_id: Option<i32>,
    pub configuration: Json<TestConfiguration>,
    pub questions: Json<Vec<PaperQuestion>>,
    pub current_question_index: i32,
    pub answers_given: Json<BTreeMap<i64, GivenAnswer>>,
    pub skipped_question_ids: Json<BTreeSet<i64>>,
    pub correct_count: i32,
    pub wrong_count: i32,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub remaining_time_seconds: Option<i64>,
    pub finished_at: Option<DateTime<Utc>>,
    pub time_taken_seconds: Option<i64>,
    pub status: String,
    pub total_questions: i32,
    pub score_percentage: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TestSessionRow> for TestSession {
    type Error = Error;

    fn try_from(row: TestSessionRow) -> Result<Self> {
        let status = row
            .status
            .parse::<TestStatus>()
            .map_err(|e| Error::Internal(format!("test session {}: {}", row.id, e)))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            test_template_id: row.test_template_id,
            license_type_id: row.license_type_id,
            configuration: row.configuration.0,
            questions: row.questions.0,
            current_question_index: row.current_question_index,
            answers_given: row.answers_given.0,
            skipped_question_ids: row.skipped_question_ids.0,
            correct_count: row.correct_count,
            wrong_count: row.wrong_count,
            started_at: row.started_at,
            paused_at: row.paused_at,
            remaining_time_seconds: row.remaining_time_seconds,
            finished_at: row.finished_at,
            time_taken_seconds: row.time_taken_seconds,
            status,
            total_questions: row.total_questions,
            score_percentage: row.score_percentage,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
