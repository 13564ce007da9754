use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::question_dto::{PaginatedQuestions, QuestionQuery};
use crate::error::{Error, Result};
use crate::models::answer::Answer;
use crate::models::category::CategoryWithCount;
use crate::models::license_type::{build_tree, LicenseType, LicenseTypeNode};
use crate::models::question::{Question, QuestionDetails, RoadSign};
use crate::models::test_configuration::{TestConfiguration, TestKind};
use crate::models::test_session::PaperQuestion;
use crate::models::test_template::TestTemplate;
use crate::utils::validation::{page_params, total_pages};

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct QuestionService {
    pool: PgPool,
}

impl QuestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_license_types(&self) -> Result<Vec<LicenseTypeNode>> {
        let types = sqlx::query_as::<_, LicenseType>(
            r#"SELECT id, code, name, parent_id, is_parent FROM license_types ORDER BY code"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(build_tree(types))
    }

    /// Ids whose questions a session for `license_type_id` may draw from:
    /// the type itself and, for a parent type, all of its children.
    pub async fn eligible_license_type_ids(&self, license_type_id: i32) -> Result<Vec<i32>> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT lt.id FROM license_types lt
            WHERE lt.id = $1
               OR (lt.parent_id = $1
                   AND EXISTS (SELECT 1 FROM license_types p WHERE p.id = $1 AND p.is_parent))
            "#,
        )
        .bind(license_type_id)
        .fetch_all(&self.pool)
        .await?;

        if ids.is_empty() {
            return Err(Error::NotFound(format!(
                "License type {} not found",
                license_type_id
            )));
        }
        Ok(ids)
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryWithCount>> {
        let rows = sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT c.id, c.name, c.description, c.position,
                   COUNT(q.id) AS question_count
            FROM categories c
            LEFT JOIN questions q ON q.category_id = c.id AND q.is_active
            GROUP BY c.id, c.name, c.description, c.position
            ORDER BY c.position, c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_questions(&self, query: QuestionQuery) -> Result<PaginatedQuestions> {
        let (page, per_page) = page_params(query.page, query.per_page, MAX_PAGE_SIZE);
        let offset = (page - 1) * per_page;

        let items = sqlx::query_as::<_, Question>(
            r#"
            SELECT q.id, q.category_id, q.text, q.explanation, q.image_path,
                   q.is_short_image, q.is_active, q.created_at
            FROM questions q
            WHERE q.is_active
              AND ($1::int IS NULL OR q.category_id = $1)
              AND ($2::int IS NULL OR EXISTS (
                    SELECT 1 FROM license_type_question ltq
                    WHERE ltq.question_id = q.id AND ltq.license_type_id = $2))
            ORDER BY q.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.category_id)
        .bind(query.license_type_id)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM questions q
            WHERE q.is_active
              AND ($1::int IS NULL OR q.category_id = $1)
              AND ($2::int IS NULL OR EXISTS (
                    SELECT 1 FROM license_type_question ltq
                    WHERE ltq.question_id = q.id AND ltq.license_type_id = $2))
            "#,
        )
        .bind(query.category_id)
        .bind(query.license_type_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(PaginatedQuestions {
            items,
            total,
            page,
            per_page,
            total_pages: total_pages(total, per_page),
        })
    }

    pub async fn get_question(&self, question_id: i64) -> Result<QuestionDetails> {
        let question = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, category_id, text, explanation, image_path,
                   is_short_image, is_active, created_at
            FROM questions WHERE id = $1
            "#,
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Question {} not found", question_id)))?;

        let answers = sqlx::query_as::<_, Answer>(
            r#"
            SELECT id, question_id, text, position, is_correct
            FROM answers WHERE question_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        let road_signs = sqlx::query_as::<_, RoadSign>(
            r#"
            SELECT rs.id, rs.code, rs.name, rs.image_path
            FROM road_signs rs
            JOIN question_road_sign qrs ON qrs.road_sign_id = rs.id
            WHERE qrs.question_id = $1
            ORDER BY rs.code
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(QuestionDetails {
            question,
            answers,
            road_signs,
        })
    }

    pub async fn list_templates(&self) -> Result<Vec<TestTemplate>> {
        let rows = sqlx::query_as::<_, TestTemplate>(
            r#"
            SELECT id, name, description, license_type_id, configuration, is_active, created_at
            FROM test_templates WHERE is_active
            ORDER BY created_at, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_template(&self, template_id: Uuid) -> Result<TestTemplate> {
        sqlx::query_as::<_, TestTemplate>(
            r#"
            SELECT id, name, description, license_type_id, configuration, is_active, created_at
            FROM test_templates WHERE id = $1 AND is_active
            "#,
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Test template {} not found", template_id)))
    }

    /// Draws a random paper for a new session.
    pub async fn select_paper(
        &self,
        user_id: Uuid,
        license_type_id: Option<i32>,
        configuration: &TestConfiguration,
    ) -> Result<Vec<PaperQuestion>> {
        let license_ids = match license_type_id {
            Some(id) => Some(self.eligible_license_type_ids(id).await?),
            None => None,
        };
        let limit = i64::from(configuration.effective_question_count());
        let bookmarked_only = configuration.test_kind == TestKind::Bookmarked;

        let question_ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT q.id FROM questions q
            WHERE q.is_active
              AND ($1::int[] IS NULL OR EXISTS (
                    SELECT 1 FROM license_type_question ltq
                    WHERE ltq.question_id = q.id AND ltq.license_type_id = ANY($1)))
              AND (cardinality($2::int[]) = 0 OR q.category_id = ANY($2))
              AND (NOT $3 OR EXISTS (
                    SELECT 1 FROM user_question_progress p
                    WHERE p.question_id = q.id AND p.user_id = $4 AND p.is_bookmarked))
              AND EXISTS (SELECT 1 FROM answers a WHERE a.question_id = q.id)
            ORDER BY random()
            LIMIT $5
            "#,
        )
        .bind(license_ids)
        .bind(&configuration.category_ids)
        .bind(bookmarked_only)
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if question_ids.is_empty() {
            return Err(Error::BadRequest(
                "No questions are available for this test configuration".to_string(),
            ));
        }

        let answers = sqlx::query_as::<_, Answer>(
            r#"
            SELECT id, question_id, text, position, is_correct
            FROM answers WHERE question_id = ANY($1)
            ORDER BY question_id, position, id
            "#,
        )
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(
            user_id = %user_id,
            selected = question_ids.len(),
            requested = limit,
            "selected test paper"
        );
        Ok(build_paper(&question_ids, &answers))
    }
}

/// Pairs each selected question, in selection order, with its answer ids in
/// display order. Questions without answers are left out.
pub fn build_paper(question_ids: &[i64], answers: &[Answer]) -> Vec<PaperQuestion> {
    let mut by_question: HashMap<i64, Vec<&Answer>> = HashMap::new();
    for answer in answers {
        by_question.entry(answer.question_id).or_default().push(answer);
    }

    question_ids
        .iter()
        .filter_map(|&question_id| {
            let mut list = by_question.remove(&question_id)?;
            list.sort_by_key(|a| (a.position, a.id));
            Some(PaperQuestion {
                question_id,
                answer_ids: list.into_iter().map(|a| a.id).collect(),
            })
        })
        .collect()
}
