//! Single-flight access token refresh.
//!
//! Every caller rejected with the same stale token shares one exchange with
//! the identity provider and observes the same outcome, including callers
//! that arrive after the exchange has finished.

use crate::credentials::CredentialStore;
use crate::services::identity_client::{IdentityClient, IdentityError};
use crate::session::SessionManager;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    #[error("No refresh token is stored")]
    MissingRefreshToken,

    #[error("Refresh token was rejected: {0}")]
    Rejected(String),

    #[error("Token refresh timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Credential store failed during refresh: {0}")]
    Storage(String),
}

pub(crate) type RefreshOutcome = Result<String, RefreshFailure>;

struct Flight {
    stale: Option<String>,
    outcome: Shared<BoxFuture<'static, RefreshOutcome>>,
}

pub(crate) struct RefreshCoordinator {
    store: Arc<dyn CredentialStore>,
    identity: Arc<IdentityClient>,
    session: Arc<SessionManager>,
    timeout: Duration,
    latest: Mutex<Option<Flight>>,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        store: Arc<dyn CredentialStore>,
        identity: Arc<IdentityClient>,
        session: Arc<SessionManager>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            identity,
            session,
            timeout,
            latest: Mutex::new(None),
        }
    }

    /// Access token to use in place of `stale`, which the backend just
    /// rejected.
    pub(crate) async fn replacement_for(&self, stale: Option<&str>) -> RefreshOutcome {
        let outcome = {
            let mut latest = self.latest.lock().await;

            let current = self
                .store
                .access_token()
                .await
                .map_err(|e| RefreshFailure::Storage(e.to_string()))?;
            if let Some(current) = current {
                if Some(current.as_str()) != stale {
                    tracing::debug!("Access token was already replaced, reusing it");
                    return Ok(current);
                }
            }

            match latest.as_ref() {
                Some(flight) if flight.stale.as_deref() == stale => {
                    tracing::debug!("Joining token refresh");
                    flight.outcome.clone()
                }
                _ => {
                    let outcome = exchange(
                        self.store.clone(),
                        self.identity.clone(),
                        self.session.clone(),
                        self.timeout,
                    )
                    .boxed()
                    .shared();
                    *latest = Some(Flight {
                        stale: stale.map(str::to_string),
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };

        outcome.await
    }
}

async fn exchange(
    store: Arc<dyn CredentialStore>,
    identity: Arc<IdentityClient>,
    session: Arc<SessionManager>,
    timeout: Duration,
) -> RefreshOutcome {
    let refresh = match store.refresh_token().await {
        Ok(Some(refresh)) => refresh,
        Ok(None) => {
            tracing::debug!("No refresh token stored, not refreshing");
            return Err(RefreshFailure::MissingRefreshToken);
        }
        Err(e) => return Err(expire(&*store, &session, RefreshFailure::Storage(e.to_string())).await),
    };

    tracing::info!("Refreshing access token");

    let failure = match tokio::time::timeout(timeout, identity.refresh_token(&refresh)).await {
        Ok(Ok(tokens)) => match store
            .store_tokens(&tokens.access, tokens.refresh.as_deref())
            .await
        {
            Ok(()) => {
                tracing::info!(rotated = tokens.refresh.is_some(), "Access token refreshed");
                return Ok(tokens.access);
            }
            Err(e) => RefreshFailure::Storage(e.to_string()),
        },
        Ok(Err(IdentityError::Transport(e))) if e.is_timeout() => RefreshFailure::TimedOut(timeout),
        Ok(Err(e)) => RefreshFailure::Rejected(
            e.payload()
                .and_then(|payload| payload.detail())
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string()),
        ),
        Err(_) => RefreshFailure::TimedOut(timeout),
    };

    Err(expire(&*store, &session, failure).await)
}

async fn expire(
    store: &dyn CredentialStore,
    session: &SessionManager,
    failure: RefreshFailure,
) -> RefreshFailure {
    tracing::warn!(error = %failure, "Token refresh failed, ending session");
    if let Err(e) = store.clear_tokens().await {
        tracing::error!("Failed to clear stored credentials: {}", e);
    }
    session.expire();
    failure
}
