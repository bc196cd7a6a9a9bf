use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid JWT format")]
    Format,

    #[error("Failed to decode JWT payload: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Failed to parse JWT claims: {0}")]
    Claims(#[from] serde_json::Error),
}

/// Claims the client relies on. Only `exp` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
}

impl JwtClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Decode JWT claims without validation.
///
/// The signature is the identity provider's concern; the client only reads
/// the expiry to decide whether a stored token is still worth presenting.
pub fn decode_jwt_claims(token: &str) -> Result<JwtClaims, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(TokenError::Format);
    }

    let payload = general_purpose::URL_SAFE_NO_PAD.decode(parts[1].trim_end_matches('='))?;
    let claims: JwtClaims = serde_json::from_slice(&payload)?;

    Ok(claims)
}
