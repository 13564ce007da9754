use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::dto::auth_dto::{CreateProfileRequest, ProfileSummary, TokenResponse};
use crate::error::{Error, Result};
use crate::models::user::User;
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::time;
use crate::utils::token::issue_token;
use crate::utils::validation::validate;

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    config: Arc<Config>,
}

impl AuthService {
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        Self { pool, config }
    }

    pub async fn list_profiles(&self) -> Result<Vec<ProfileSummary>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, password_hash, default_license_type_id, created_at, updated_at
            FROM users ORDER BY name, created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users.iter().map(ProfileSummary::from).collect())
    }

    pub async fn create_profile(&self, req: CreateProfileRequest) -> Result<ProfileSummary> {
        validate(&req)?;
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::BadRequest("Profile name must not be blank".to_string()));
        }
        let password_hash = match req.password.as_deref() {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, password_hash, default_license_type_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, password_hash, default_license_type_id, created_at, updated_at
            "#,
        )
        .bind(&name)
        .bind(password_hash)
        .bind(req.default_license_type_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = %user.id, protected = user.has_password(), "profile created");
        Ok(ProfileSummary::from(&user))
    }

    /// Checks the password when the profile has one and issues a bearer token.
    pub async fn select_profile(&self, user_id: Uuid, password: Option<&str>) -> Result<TokenResponse> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, password_hash, default_license_type_id, created_at, updated_at
            FROM users WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Profile {} not found", user_id)))?;

        if let Some(hash) = user.password_hash.as_deref() {
            let supplied = password
                .ok_or_else(|| Error::Unauthorized("password_required".to_string()))?;
            if !verify_password(supplied, hash)? {
                tracing::warn!(user_id = %user_id, "profile selection with wrong password");
                return Err(Error::Unauthorized("invalid_password".to_string()));
            }
        }

        let (token, expires_at) = issue_token(
            user.id,
            &self.config.jwt_secret,
            self.config.token_ttl_hours,
            time::now(),
        )?;
        tracing::info!(user_id = %user.id, "profile selected");

        Ok(TokenResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_at,
            profile: ProfileSummary::from(&user),
        })
    }
}
