//! End-to-end workflow tests for the audit client.
//!
//! Tests drive real [`AppContext`]s against [`FakePortal`], an in-process
//! identity provider and audit-management backend, so whole flows (login,
//! token refresh, the approval chain) run without external services.
//!
//! ## Usage
//!
//! ```bash
//! cargo test -p workflow-tests
//! ```

mod portal;

pub use portal::FakePortal;

use audit_client::config::{ApiSettings, CredentialBackend, CredentialSettings, Settings, TelemetrySettings};
use audit_client::credentials::CredentialStore;
use audit_client::AppContext;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,audit_client=debug,workflow_tests=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Unsigned access token for `user_id` expiring `ttl_secs` from now.
pub fn mint_token(ttl_secs: i64, user_id: i64) -> String {
    let issued_at = Utc::now().timestamp();
    let payload = serde_json::json!({
        "token_type": "access",
        "exp": issued_at + ttl_secs,
        "iat": issued_at,
        "jti": format!("{}-{}-{}", user_id, ttl_secs, issued_at),
        "user_id": user_id,
    });
    format!(
        "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{}.signature",
        general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

/// Client settings pointing at `portal`.
pub fn settings_for(portal: &FakePortal) -> Settings {
    let mut api = ApiSettings::new(portal.base_url());
    api.refresh_timeout_secs = 5;
    Settings {
        api,
        credentials: CredentialSettings {
            backend: CredentialBackend::Memory,
            ..Default::default()
        },
        telemetry: TelemetrySettings::default(),
    }
}

/// A client whose credentials live in the JSON file at `path`.
pub async fn file_backed_context(portal: &FakePortal, path: &Path) -> anyhow::Result<AppContext> {
    let mut settings = settings_for(portal);
    settings.credentials = CredentialSettings {
        backend: CredentialBackend::File,
        path: path.to_path_buf(),
    };
    AppContext::build(&settings).await
}

/// A client over an existing store, restored and ready.
pub async fn restored_context(
    portal: &FakePortal,
    store: Arc<dyn CredentialStore>,
) -> anyhow::Result<AppContext> {
    init_tracing();
    let context = AppContext::new(&settings_for(portal), store)?;
    context.session.restore().await;
    context.session.wait_ready().await;
    Ok(context)
}

/// A fresh in-memory client logged in as `username`.
pub async fn logged_in(
    portal: &FakePortal,
    username: &str,
    password: &str,
) -> anyhow::Result<AppContext> {
    init_tracing();
    let context = AppContext::build(&settings_for(portal)).await?;
    context.session.restore().await;
    context
        .session
        .login(username, password)
        .await
        .map_err(|e| anyhow::anyhow!("Login as {} failed: {}", username, e.reason()))?;
    Ok(context)
}
