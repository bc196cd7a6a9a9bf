use audit_client::config::get_configuration;
use audit_client::session::AuthState;
use audit_client::workflow::{action_label, available_actions};
use audit_client::AppContext;
use dotenvy::dotenv;
use secrecy::{ExposeSecret, Secret};
use service_core::observability::logging::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        &configuration.telemetry.service_name,
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    )?;

    let context = AppContext::build(&configuration).await?;

    // Logging out needs no identity fetch, so skip restore entirely.
    if std::env::args().nth(1).as_deref() == Some("logout") {
        context.session.logout().await;
        return Ok(());
    }

    context.session.restore().await;
    let mut state = context.session.wait_ready().await;

    if state == AuthState::Unauthenticated {
        if let (Ok(username), Ok(password)) = (
            std::env::var("AUDIT_USERNAME"),
            std::env::var("AUDIT_PASSWORD"),
        ) {
            let password = Secret::new(password);
            match context
                .session
                .login(&username, password.expose_secret())
                .await
            {
                Ok(_) => state = context.session.state(),
                Err(e) => {
                    tracing::error!(username = %username, "Login failed: {}", e.reason());
                    return Err(anyhow::anyhow!("Login failed: {}", e.reason()));
                }
            }
        }
    }

    let Some(identity) = state.identity() else {
        info!("Not logged in; set AUDIT_USERNAME and AUDIT_PASSWORD to log in");
        return Ok(());
    };

    info!(
        user = %identity.username,
        role = %identity.role.display_name(),
        "Session ready"
    );

    let worklist = context.audit.worklist().await.map_err(|e| {
        tracing::error!("Failed to load audit requests: {}", e);
        anyhow::anyhow!("Failed to load audit requests: {}", e)
    })?;

    for request in worklist.pending.iter().chain(worklist.reviewed.iter()) {
        let actions: Vec<&str> = available_actions(identity.role, request.status)
            .iter()
            .map(|next| action_label(*next))
            .collect();
        info!(
            request_id = request.id,
            provider = %request.service_provider_name,
            location = %request.data_center_location,
            status = %request.status_label(),
            closed = request.status.is_terminal(),
            actions = ?actions,
            "Audit request"
        );
    }

    info!(
        pending = worklist.pending.len(),
        reviewed = worklist.reviewed.len(),
        "Worklist loaded"
    );

    Ok(())
}
