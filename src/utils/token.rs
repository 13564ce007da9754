use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| Error::Unauthorized("token subject is not a profile id".to_string()))
    }
}

pub fn generate_token_id(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Signs an HS256 token for `user_id`; returns it with its expiry.
pub fn issue_token(
    user_id: Uuid,
    secret: &str,
    ttl_hours: i64,
    now: DateTime<Utc>,
) -> Result<(String, DateTime<Utc>)> {
    let expires_at = now + Duration::hours(ttl_hours);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expires_at.timestamp().max(0) as usize,
        iat: now.timestamp().max(0) as usize,
        jti: generate_token_id(16),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, expires_at))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let user = Uuid::new_v4();
        let (token, expires_at) = issue_token(user, "secret", 2, Utc::now()).unwrap();
        assert!(expires_at > Utc::now());
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id().unwrap(), user);
        assert_eq!(claims.jti.len(), 16);
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let user = Uuid::new_v4();
        let (token, _) = issue_token(user, "secret", 2, Utc::now()).unwrap();
        assert!(matches!(verify_token(&token, "other"), Err(Error::Token(_))));

        let (stale, _) = issue_token(user, "secret", -3, Utc::now()).unwrap();
        assert!(verify_token(&stale, "secret").is_err());
    }
}
