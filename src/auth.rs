//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs (as issued by Supabase Auth). The signature and
//! `exp` are verified before the `sub` claim is trusted as the owner id.
//! `aud` is checked only when an audience is configured.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use memory_vault_core::error::PipelineError;

use crate::config::AuthConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No authorization header found")]
    MissingHeader,
    #[error("Malformed authorization header")]
    Malformed,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("{0} environment variable not set")]
    MissingSecret(String),
}

impl From<AuthError> for PipelineError {
    fn from(e: AuthError) -> Self {
        PipelineError::Auth(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Owner id.
    pub sub: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub struct Authenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    audience: Option<String>,
}

impl Authenticator {
    pub fn new(secret: &str, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            audience: audience.map(str::to_string),
        }
    }

    /// Build from config, reading the secret from the named env var.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let secret = std::env::var(&config.jwt_secret_env)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::MissingSecret(config.jwt_secret_env.clone()))?;
        Ok(Self::new(&secret, config.audience.as_deref()))
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            AuthError::InvalidToken
        })?;
        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(data.claims)
    }

    /// Resolve the owner id from an `Authorization` header value.
    pub fn authenticate(&self, header: Option<&str>) -> Result<String, AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        let token = bearer_token(header)?;
        Ok(self.verify(token)?.sub)
    }

    /// Sign a token for `owner_id` valid for `ttl_secs`. Used by the CLI and
    /// tests to mint local tokens.
    pub fn issue(&self, owner_id: &str, ttl_secs: u64) -> Result<String, AuthError> {
        let exp = chrono::Utc::now().timestamp().max(0) as u64 + ttl_secs;
        let claims = Claims {
            sub: owner_id.to_string(),
            exp,
            aud: self.audience.clone(),
            email: None,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| AuthError::InvalidToken)
    }
}

/// Split `Bearer <token>`.
fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::Malformed),
    }
}
