//! Common test utilities for workflow integration tests.

use audit_client::AppContext;
use workflow_tests::FakePortal;

pub const PASSWORD: &str = "correct-horse-battery";

/// One account per role, logged in against the same portal.
pub struct Cast {
    pub portal: FakePortal,
    pub csp: AppContext,
    pub reviewer: AppContext,
    pub auditor: AppContext,
    pub scientist: AppContext,
}

/// Start a portal with one account per role.
pub async fn seeded_portal() -> FakePortal {
    workflow_tests::init_tracing();
    let portal = FakePortal::start().await;
    portal.add_account("acme", PASSWORD, "CSP");
    portal.add_account("reviewer", PASSWORD, "MeitY_Reviewer");
    portal.add_account("auditor", PASSWORD, "STQC_Auditor");
    portal.add_account("scientist", PASSWORD, "Scientist_F");
    portal
}

/// Start a seeded portal and log every role in.
pub async fn setup() -> Cast {
    let portal = seeded_portal().await;

    let csp = login(&portal, "acme").await;
    let reviewer = login(&portal, "reviewer").await;
    let auditor = login(&portal, "auditor").await;
    let scientist = login(&portal, "scientist").await;

    Cast {
        portal,
        csp,
        reviewer,
        auditor,
        scientist,
    }
}

pub async fn login(portal: &FakePortal, username: &str) -> AppContext {
    workflow_tests::logged_in(portal, username, PASSWORD)
        .await
        .expect("Failed to log in seeded account")
}
