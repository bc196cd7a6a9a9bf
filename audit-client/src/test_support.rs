use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;

/// Unsigned access token expiring `ttl_secs` from now.
pub(crate) fn mint_token(ttl_secs: i64, user_id: i64) -> String {
    let payload = serde_json::json!({
        "token_type": "access",
        "exp": Utc::now().timestamp() + ttl_secs,
        "iat": Utc::now().timestamp(),
        "jti": format!("jti-{}-{}", user_id, ttl_secs),
        "user_id": user_id,
    });
    format!(
        "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{}.signature",
        general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}
