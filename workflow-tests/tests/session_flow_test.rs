//! Session lifecycle: login, restore across restarts, register, logout.

mod common;

use audit_client::credentials::{CredentialStore, MemoryCredentialStore};
use audit_client::models::{Registration, Role};
use audit_client::session::AuthState;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn wrong_password_reports_provider_detail() {
    let portal = common::seeded_portal().await;
    let context = audit_client::AppContext::build(&workflow_tests::settings_for(&portal))
        .await
        .unwrap();
    context.session.restore().await;

    let err = context.session.login("acme", "wrong").await.unwrap_err();
    assert_eq!(
        err.reason(),
        "No active account found with the given credentials"
    );
    assert_eq!(context.session.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn session_survives_restart_with_file_store() {
    let portal = common::seeded_portal().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");

    let first = workflow_tests::file_backed_context(&portal, &path)
        .await
        .unwrap();
    first.session.restore().await;
    let identity = first
        .session
        .login("auditor", common::PASSWORD)
        .await
        .unwrap();
    assert_eq!(identity.role, Role::StqcAuditor);
    drop(first);

    let second = workflow_tests::file_backed_context(&portal, &path)
        .await
        .unwrap();
    let state = second.session.restore().await;
    assert_eq!(state.identity().map(|i| i.username.as_str()), Some("auditor"));
    assert_eq!(second.session.wait_ready().await, state);
}

#[tokio::test]
async fn logout_then_restore_makes_no_calls() {
    let portal = common::seeded_portal().await;
    let store = Arc::new(MemoryCredentialStore::new());
    let context = workflow_tests::restored_context(&portal, store.clone())
        .await
        .unwrap();
    context
        .session
        .login("reviewer", common::PASSWORD)
        .await
        .unwrap();

    context.session.logout().await;
    assert_eq!(store.tokens().await.unwrap(), Default::default());

    let before = portal.received().await;
    let restored = workflow_tests::restored_context(&portal, store).await.unwrap();
    assert_eq!(restored.session.state(), AuthState::Unauthenticated);
    assert_eq!(portal.received().await, before);
}

#[tokio::test]
async fn register_then_logged_in() {
    let portal = common::seeded_portal().await;
    let context = workflow_tests::restored_context(&portal, Arc::new(MemoryCredentialStore::new()))
        .await
        .unwrap();

    let identity = context
        .session
        .register(&Registration {
            username: "nimbus".to_string(),
            email: "ops@nimbus.example".to_string(),
            password: "a-long-enough-password".to_string(),
            role: Role::Csp,
            organization: Some("Nimbus Cloud".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(identity.username, "nimbus");
    assert_eq!(identity.role, Role::Csp);
    assert!(context.session.is_authenticated());
}

#[tokio::test]
async fn duplicate_registration_reports_field_errors() {
    let portal = common::seeded_portal().await;
    let context = workflow_tests::restored_context(&portal, Arc::new(MemoryCredentialStore::new()))
        .await
        .unwrap();

    let err = context
        .session
        .register(&Registration {
            username: "acme".to_string(),
            email: "second@acme.example".to_string(),
            password: "short".to_string(),
            role: Role::Csp,
            organization: None,
        })
        .await
        .unwrap_err();

    assert_eq!(
        err.reason(),
        "Username: A user with that username already exists."
    );
    assert!(!context.session.is_authenticated());
}
