pub mod config;
pub mod credentials;
pub mod gateway;
pub mod jwt;
pub mod models;
pub mod services;
pub mod session;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

use crate::config::{CredentialBackend, Settings};
use crate::credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use crate::gateway::ApiGateway;
use crate::services::{audit_client::AuditClient, identity_client::IdentityClient};
use crate::session::SessionManager;
use std::sync::Arc;

/// Shared client state: one session, one gateway and the typed audit
/// operations built on them.
#[derive(Clone)]
pub struct AppContext {
    pub session: Arc<SessionManager>,
    pub gateway: ApiGateway,
    pub audit: Arc<AuditClient>,
}

impl AppContext {
    /// Wire the components around `store`.
    pub fn new(settings: &Settings, store: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.api.request_timeout())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        let identity = Arc::new(IdentityClient::new(client.clone(), settings.api.clone()));
        let session = Arc::new(SessionManager::new(store.clone(), identity.clone()));
        let gateway = ApiGateway::new(
            client,
            settings.api.clone(),
            store,
            identity,
            session.clone(),
        );
        let audit = Arc::new(AuditClient::new(gateway.clone(), session.clone()));

        Ok(Self {
            session,
            gateway,
            audit,
        })
    }

    /// Open the configured credential store and wire the components.
    pub async fn build(settings: &Settings) -> anyhow::Result<Self> {
        let store: Arc<dyn CredentialStore> = match settings.credentials.backend {
            CredentialBackend::File => {
                let store = FileCredentialStore::open(&settings.credentials.path)
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            path = %settings.credentials.path.display(),
                            "Failed to open credential store: {}",
                            e
                        );
                        anyhow::anyhow!("Credential store error: {}", e)
                    })?;
                Arc::new(store)
            }
            CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        };

        Self::new(settings, store)
    }
}
