use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::dto::session_dto::{
    AbandonResponse, AnswerRequest, AnswerResponse, CreateSessionRequest, HistoryQuery,
    PaginatedSessions, SessionStats, SessionSummary, SessionView, StepResponse,
};
use crate::error::{Error, Result};
use crate::models::test_configuration::TestConfiguration;
use crate::models::test_session::{StepOutcome, TestSession, TestSessionRow};
use crate::models::test_status::TestStatus;
use crate::services::progress_service::ProgressService;
use crate::services::question_service::QuestionService;
use crate::services::scoring_service::ScoringService;
use crate::utils::time;
use crate::utils::validation::{page_params, total_pages, validate};

const MAX_PAGE_SIZE: i64 = 50;

#[derive(Clone)]
pub struct SessionService {
    pool: PgPool,
    questions: QuestionService,
}

impl SessionService {
    pub fn new(pool: PgPool) -> Self {
        let questions = QuestionService::new(pool.clone());
        Self { pool, questions }
    }

    /// Starts a new session, abandoning whatever the user still had open.
    pub async fn create(&self, user_id: Uuid, req: CreateSessionRequest) -> Result<SessionView> {
        validate(&req)?;
        let (configuration, template_license) = match req.template_id {
            Some(template_id) => {
                let template = self.questions.get_template(template_id).await?;
                (
                    template_configuration(&template.configuration)?,
                    template.license_type_id,
                )
            }
            None => (req.to_configuration()?, None),
        };

        let license_type_id = match req.license_type_id.or(template_license) {
            Some(id) => Some(id),
            None => self.default_license_type(user_id).await?,
        };

        let paper = self
            .questions
            .select_paper(user_id, license_type_id, &configuration)
            .await?;

        let now = time::now();
        let session = TestSession::new(
            user_id,
            req.template_id,
            license_type_id,
            configuration,
            paper,
            now,
        );

        let mut tx = self.pool.begin().await?;
        let superseded = Self::abandon_active(&mut tx, user_id, now).await?;
        Self::insert(&mut tx, &session).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            user_id = %user_id,
            total_questions = session.total_questions,
            superseded,
            "test session started"
        );
        self.view(session, now).await
    }

    pub async fn get(&self, user_id: Uuid, session_id: Uuid) -> Result<SessionView> {
        let row = sqlx::query_as::<_, TestSessionRow>(
            r#"SELECT * FROM test_sessions WHERE id = $1 AND user_id = $2"#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(session_id))?;
        self.view(TestSession::try_from(row)?, time::now()).await
    }

    pub async fn answer(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        req: AnswerRequest,
    ) -> Result<AnswerResponse> {
        let question = self.questions.get_question(req.question_id).await?;
        let is_correct = ScoringService::grade_answer(&question, req.answer_id).ok_or_else(|| {
            Error::BadRequest(format!(
                "Answer {} does not belong to question {}",
                req.answer_id, req.question_id
            ))
        })?;

        let now = time::now();
        let mut tx = self.pool.begin().await?;
        let mut session = Self::lock(&mut tx, user_id, session_id).await?;
        let outcome = session.answer(req.question_id, req.answer_id, is_correct, now)?;
        if outcome == StepOutcome::Applied {
            ProgressService::record_answer(&mut tx, user_id, req.question_id, is_correct, now)
                .await?;
        }
        Self::save(&mut tx, &session).await?;
        tx.commit().await?;

        tracing::info!(
            session_id = %session_id,
            question_id = req.question_id,
            is_correct,
            status = %session.status,
            wrong = session.wrong_count,
            allowed = session.allowed_mistakes(),
            "answer processed"
        );

        let applied = outcome == StepOutcome::Applied;
        Ok(AnswerResponse {
            result: outcome.into(),
            is_correct: applied.then_some(is_correct),
            correct_answer_id: if applied { question.correct_answer_id() } else { None },
            explanation: if applied {
                question.question.explanation.clone()
            } else {
                None
            },
            session: self.view(session, now).await?,
        })
    }

    pub async fn skip(&self, user_id: Uuid, session_id: Uuid, question_id: i64) -> Result<StepResponse> {
        let (session, outcome, now) = self
            .mutate(user_id, session_id, |s, now| s.skip(question_id, now))
            .await?;
        Ok(StepResponse {
            result: outcome.into(),
            session: self.view(session, now).await?,
        })
    }

    pub async fn navigate(&self, user_id: Uuid, session_id: Uuid, index: i32) -> Result<StepResponse> {
        let (session, outcome, now) = self
            .mutate(user_id, session_id, |s, now| s.navigate(index, now))
            .await?;
        Ok(StepResponse {
            result: outcome.into(),
            session: self.view(session, now).await?,
        })
    }

    pub async fn pause(&self, user_id: Uuid, session_id: Uuid) -> Result<StepResponse> {
        let (session, outcome, now) = self
            .mutate(user_id, session_id, |s, now| s.pause(now))
            .await?;
        tracing::info!(session_id = %session_id, remaining = ?session.remaining_time_seconds, "test session paused");
        Ok(StepResponse {
            result: outcome.into(),
            session: self.view(session, now).await?,
        })
    }

    pub async fn resume(&self, user_id: Uuid, session_id: Uuid) -> Result<SessionView> {
        let (session, (), now) = self
            .mutate(user_id, session_id, |s, now| s.resume(now))
            .await?;
        tracing::info!(session_id = %session_id, "test session resumed");
        self.view(session, now).await
    }

    pub async fn finish(&self, user_id: Uuid, session_id: Uuid) -> Result<SessionView> {
        let (session, status, now) = self
            .mutate(user_id, session_id, |s, now| s.finish(now))
            .await?;
        tracing::info!(session_id = %session_id, status = %status, score = ?session.score_percentage, "test session finished");
        self.view(session, now).await
    }

    /// Abandons an active session. A finished one is returned untouched with
    /// `abandoned: false`.
    pub async fn abandon(&self, user_id: Uuid, session_id: Uuid) -> Result<AbandonResponse> {
        let now = time::now();
        let mut tx = self.pool.begin().await?;
        let mut session = Self::lock(&mut tx, user_id, session_id).await?;
        let abandoned = session.abandon(now);
        if abandoned {
            Self::save(&mut tx, &session).await?;
            tracing::info!(session_id = %session_id, "test session abandoned");
        } else {
            tracing::debug!(session_id = %session_id, status = %session.status, "abandon ignored for inactive session");
        }
        tx.commit().await?;

        Ok(AbandonResponse {
            abandoned,
            session: self.view(session, now).await?,
        })
    }

    pub async fn list_history(&self, user_id: Uuid, query: HistoryQuery) -> Result<PaginatedSessions> {
        let (page, per_page) = page_params(query.page, query.per_page, MAX_PAGE_SIZE);
        let offset = (page - 1) * per_page;
        let status = query.status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, TestSessionRow>(
            r#"
            SELECT * FROM test_sessions
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(status)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM test_sessions WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)"#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|row| TestSession::try_from(row).map(|s| SessionSummary::from(&s)))
            .collect::<Result<Vec<_>>>()?;

        Ok(PaginatedSessions {
            items,
            total,
            page,
            per_page,
            total_pages: total_pages(total, per_page),
        })
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<SessionStats> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT status, COUNT(*) FROM test_sessions WHERE user_id = $1 GROUP BY status"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let by_status: HashMap<String, i64> = rows.into_iter().collect();

        let average_score: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT ROUND(AVG(score_percentage), 2) FROM test_sessions
            WHERE user_id = $1 AND status IN ($2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(TestStatus::Completed.as_str())
        .bind(TestStatus::Passed.as_str())
        .bind(TestStatus::Failed.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(SessionStats {
            total: by_status.values().sum(),
            pass_rate: ScoringService::pass_rate(&by_status),
            average_score,
            by_status,
        })
    }

    async fn mutate<T, F>(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        apply: F,
    ) -> Result<(TestSession, T, DateTime<Utc>)>
    where
        F: FnOnce(&mut TestSession, DateTime<Utc>) -> Result<T>,
    {
        let now = time::now();
        let mut tx = self.pool.begin().await?;
        let mut session = Self::lock(&mut tx, user_id, session_id).await?;
        let out = apply(&mut session, now)?;
        Self::save(&mut tx, &session).await?;
        tx.commit().await?;
        Ok((session, out, now))
    }

    async fn view(&self, session: TestSession, now: DateTime<Utc>) -> Result<SessionView> {
        let current = match session.current_question() {
            Some(paper_question) if session.status.is_active() => {
                Some(self.questions.get_question(paper_question.question_id).await?)
            }
            _ => None,
        };
        Ok(SessionView::build(&session, now, current))
    }

    async fn default_license_type(&self, user_id: Uuid) -> Result<Option<i32>> {
        let default: Option<Option<i32>> =
            sqlx::query_scalar(r#"SELECT default_license_type_id FROM users WHERE id = $1"#)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(default.flatten())
    }

    async fn lock(conn: &mut PgConnection, user_id: Uuid, session_id: Uuid) -> Result<TestSession> {
        let row = sqlx::query_as::<_, TestSessionRow>(
            r#"SELECT * FROM test_sessions WHERE id = $1 AND user_id = $2 FOR UPDATE"#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| not_found(session_id))?;
        TestSession::try_from(row)
    }

    async fn abandon_active(conn: &mut PgConnection, user_id: Uuid, now: DateTime<Utc>) -> Result<usize> {
        let rows = sqlx::query_as::<_, TestSessionRow>(
            r#"SELECT * FROM test_sessions WHERE user_id = $1 AND status IN ($2, $3) FOR UPDATE"#,
        )
        .bind(user_id)
        .bind(TestStatus::InProgress.as_str())
        .bind(TestStatus::Paused.as_str())
        .fetch_all(&mut *conn)
        .await?;

        let mut abandoned = 0;
        for row in rows {
            let mut session = TestSession::try_from(row)?;
            if session.abandon(now) {
                Self::save(&mut *conn, &session).await?;
                abandoned += 1;
            }
        }
        Ok(abandoned)
    }

    async fn insert(conn: &mut PgConnection, session: &TestSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO test_sessions (
                id, user_id, test_template_id, license_type_id, configuration, questions,
                current_question_index, answers_given, skipped_question_ids,
                correct_count, wrong_count, started_at, paused_at, remaining_time_seconds,
                finished_at, time_taken_seconds, status, total_questions, score_percentage,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9,
                $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19,
                $20, $21
            )
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.test_template_id)
        .bind(session.license_type_id)
        .bind(Json(&session.configuration))
        .bind(Json(&session.questions))
        .bind(session.current_question_index)
        .bind(Json(&session.answers_given))
        .bind(Json(&session.skipped_question_ids))
        .bind(session.correct_count)
        .bind(session.wrong_count)
        .bind(session.started_at)
        .bind(session.paused_at)
        .bind(session.remaining_time_seconds)
        .bind(session.finished_at)
        .bind(session.time_taken_seconds)
        .bind(session.status.as_str())
        .bind(session.total_questions)
        .bind(session.score_percentage)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn save(conn: &mut PgConnection, session: &TestSession) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE test_sessions
            SET current_question_index = $2,
                answers_given = $3,
                skipped_question_ids = $4,
                correct_count = $5,
                wrong_count = $6,
                started_at = $7,
                paused_at = $8,
                remaining_time_seconds = $9,
                finished_at = $10,
                time_taken_seconds = $11,
                status = $12,
                score_percentage = $13,
                updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(session.id)
        .bind(session.current_question_index)
        .bind(Json(&session.answers_given))
        .bind(Json(&session.skipped_question_ids))
        .bind(session.correct_count)
        .bind(session.wrong_count)
        .bind(session.started_at)
        .bind(session.paused_at)
        .bind(session.remaining_time_seconds)
        .bind(session.finished_at)
        .bind(session.time_taken_seconds)
        .bind(session.status.as_str())
        .bind(session.score_percentage)
        .bind(session.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}

fn not_found(session_id: Uuid) -> Error {
    Error::NotFound(format!("Test session {} not found", session_id))
}

/// Configuration of the template, re-checked against the create limits.
pub fn template_configuration(cfg: &TestConfiguration) -> Result<TestConfiguration> {
    let req = CreateSessionRequest::from_configuration(cfg);
    validate(&req)?;
    req.to_configuration()
}
