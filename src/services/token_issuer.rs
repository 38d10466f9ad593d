use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::types::UserId;
use crate::utils::jwt::{self, Claims};
use crate::utils::token::{self, RefreshTokenSecret};

/// Issues signed access tokens and opaque refresh tokens. Cheap to clone;
/// carries only the signing secret and the access TTL.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    jwt_secret: String,
    access_token_ttl_minutes: i64,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            access_token_ttl_minutes: config.access_token_ttl_minutes,
        }
    }

    /// Signs a short-lived access token bound to a session.
    pub fn issue_access_token(
        &self,
        user_id: &UserId,
        role_claim: Option<&str>,
        session_id: &str,
    ) -> anyhow::Result<(String, DateTime<Utc>)> {
        jwt::create_access_token(
            user_id.to_string(),
            role_claim.map(str::to_string),
            session_id.to_string(),
            &self.jwt_secret,
            self.access_token_ttl_minutes,
        )
    }

    /// Generates a fresh opaque refresh token with its storage hash.
    pub fn issue_refresh_token(&self) -> RefreshTokenSecret {
        token::generate_refresh_token()
    }

    pub fn verify_access_token(&self, token: &str) -> anyhow::Result<Claims> {
        jwt::verify_access_token(token, &self.jwt_secret)
    }

    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_minutes * 60
    }
}
