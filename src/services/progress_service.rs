use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::dto::progress_dto::{BookmarkResponse, ProgressOverview};
use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::models::user_progress::CategoryProgress;

#[derive(Clone)]
pub struct ProgressService {
    pool: PgPool,
}

impl ProgressService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Sets the bookmark flag, or flips it when `bookmarked` is `None`.
    pub async fn set_bookmark(
        &self,
        user_id: Uuid,
        question_id: i64,
        bookmarked: Option<bool>,
    ) -> Result<BookmarkResponse> {
        let exists: bool = sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM questions WHERE id = $1)"#)
            .bind(question_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(Error::NotFound(format!("Question {} not found", question_id)));
        }

        let is_bookmarked: bool = sqlx::query_scalar(
            r#"
            INSERT INTO user_question_progress (user_id, question_id, is_bookmarked)
            VALUES ($1, $2, COALESCE($3::boolean, TRUE))
            ON CONFLICT (user_id, question_id) DO UPDATE
            SET is_bookmarked = COALESCE($3::boolean, NOT user_question_progress.is_bookmarked)
            RETURNING is_bookmarked
            "#,
        )
        .bind(user_id)
        .bind(question_id)
        .bind(bookmarked)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = %user_id, question_id, is_bookmarked, "bookmark updated");
        Ok(BookmarkResponse {
            question_id,
            is_bookmarked,
        })
    }

    pub async fn list_bookmarks(&self, user_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, Question>(
            r#"
            SELECT q.id, q.category_id, q.text, q.explanation, q.image_path,
                   q.is_short_image, q.is_active, q.created_at
            FROM questions q
            JOIN user_question_progress p ON p.question_id = q.id
            WHERE p.user_id = $1 AND p.is_bookmarked
            ORDER BY q.category_id, q.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Updates answer counters and the mastery flag; runs on the caller's
    /// connection so it commits together with the session update.
    pub async fn record_answer(
        conn: &mut PgConnection,
        user_id: Uuid,
        question_id: i64,
        is_correct: bool,
        answered_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_question_progress
                (user_id, question_id, is_mastered, times_answered, times_correct, last_answered_at)
            VALUES ($1, $2, $3, 1, CASE WHEN $3 THEN 1 ELSE 0 END, $4)
            ON CONFLICT (user_id, question_id) DO UPDATE
            SET is_mastered = EXCLUDED.is_mastered,
                times_answered = user_question_progress.times_answered + 1,
                times_correct = user_question_progress.times_correct + EXCLUDED.times_correct,
                last_answered_at = EXCLUDED.last_answered_at
            "#,
        )
        .bind(user_id)
        .bind(question_id)
        .bind(is_correct)
        .bind(answered_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn overview(&self, user_id: Uuid) -> Result<ProgressOverview> {
        let categories = sqlx::query_as::<_, CategoryProgress>(
            r#"
            SELECT c.id AS category_id,
                   c.name AS category_name,
                   COUNT(q.id) AS total_questions,
                   COUNT(p.question_id) FILTER (WHERE p.times_answered > 0) AS answered,
                   COUNT(p.question_id) FILTER (WHERE p.is_mastered) AS mastered,
                   COUNT(p.question_id) FILTER (WHERE p.is_bookmarked) AS bookmarked
            FROM categories c
            LEFT JOIN questions q ON q.category_id = c.id AND q.is_active
            LEFT JOIN user_question_progress p ON p.question_id = q.id AND p.user_id = $1
            GROUP BY c.id, c.name, c.position
            ORDER BY c.position, c.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ProgressOverview::from_categories(categories))
    }

    pub async fn reset(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM user_question_progress WHERE user_id = $1"#)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        tracing::info!(user_id = %user_id, rows = result.rows_affected(), "progress reset");
        Ok(result.rows_affected())
    }
}
