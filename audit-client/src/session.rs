//! Authentication lifecycle: restore on startup, login, register, logout.
//!
//! State is published through a `watch` channel. It starts as
//! [`AuthState::Loading`] and leaves that state exactly once, when
//! [`SessionManager::restore`] resolves; observers gate on
//! [`SessionManager::wait_ready`].

use crate::credentials::CredentialStore;
use crate::jwt::decode_jwt_claims;
use crate::models::{Identity, Registration};
use crate::services::identity_client::{IdentityClient, IdentityError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use validator::Validate;

const LOGIN_FAILED: &str = "Login failed. Please check your credentials.";
const REGISTRATION_FAILED: &str = "Registration failed. Please try again.";

const REGISTRATION_FIELDS: [(&str, &str); 3] = [
    ("username", "Username"),
    ("email", "Email"),
    ("password", "Password"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Loading,
    Unauthenticated,
    Authenticated(Identity),
}

impl AuthState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthState::Authenticated(identity) => Some(identity),
            AuthState::Loading | AuthState::Unauthenticated => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{reason}")]
    InvalidCredentials { reason: String },

    #[error("{reason}")]
    RegistrationFailed { reason: String },

    #[error("Invalid registration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Storage(#[from] crate::credentials::CredentialError),
}

impl SessionError {
    /// Message suitable for showing to the user.
    pub fn reason(&self) -> String {
        match self {
            SessionError::InvalidCredentials { reason }
            | SessionError::RegistrationFailed { reason } => reason.clone(),
            SessionError::Validation(errors) => errors
                .field_errors()
                .values()
                .flat_map(|errors| errors.iter())
                .find_map(|error| error.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| REGISTRATION_FAILED.to_string()),
            SessionError::Storage(_) => LOGIN_FAILED.to_string(),
        }
    }
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    identity: Arc<IdentityClient>,
    state: watch::Sender<AuthState>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, identity: Arc<IdentityClient>) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self {
            store,
            identity,
            state,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), AuthState::Authenticated(_))
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Resolve once the session has left [`AuthState::Loading`].
    pub async fn wait_ready(&self) -> AuthState {
        let mut receiver = self.state.subscribe();
        let ready = receiver
            .wait_for(|state| *state != AuthState::Loading)
            .await
            .map(|state| state.clone());
        // The sender lives in `self`, so the channel cannot close here.
        ready.unwrap_or_else(|_| self.state())
    }

    /// Re-establish a session from stored tokens.
    ///
    /// An expired or undecodable access token is discarded without asking
    /// the provider. A token the provider no longer accepts is discarded too.
    pub async fn restore(&self) -> AuthState {
        let tokens = match self.store.tokens().await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::error!("Failed to read stored credentials: {}", e);
                return self.publish(AuthState::Unauthenticated);
            }
        };

        let Some(access) = tokens.access else {
            tracing::debug!("No stored access token");
            return self.publish(AuthState::Unauthenticated);
        };

        match decode_jwt_claims(&access) {
            Ok(claims) if claims.is_expired_at(Utc::now()) => {
                tracing::info!(
                    user_id = ?claims.user_id,
                    expired_at = ?claims.expires_at(),
                    "Stored access token has expired"
                );
                self.discard_credentials().await;
                return self.publish(AuthState::Unauthenticated);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to decode stored access token: {}", e);
                self.discard_credentials().await;
                return self.publish(AuthState::Unauthenticated);
            }
        }

        match self.identity.current_user(&access).await {
            Ok(identity) => {
                tracing::info!(
                    user_id = identity.id,
                    role = %identity.role,
                    "Session restored"
                );
                self.publish(AuthState::Authenticated(identity))
            }
            Err(e) => {
                tracing::warn!("Failed to fetch identity for stored token: {}", e);
                self.discard_credentials().await;
                self.publish(AuthState::Unauthenticated)
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, SessionError> {
        let tokens = self
            .identity
            .obtain_token(username, password)
            .await
            .map_err(|e| login_failure(&e))?;

        self.store
            .store_tokens(&tokens.access, Some(&tokens.refresh))
            .await?;

        match self.identity.current_user(&tokens.access).await {
            Ok(identity) => {
                tracing::info!(
                    user_id = identity.id,
                    role = %identity.role,
                    "User logged in"
                );
                self.publish(AuthState::Authenticated(identity.clone()));
                Ok(identity)
            }
            Err(e) => {
                // The previous session's tokens were already overwritten.
                self.discard_credentials().await;
                self.publish(AuthState::Unauthenticated);
                Err(login_failure(&e))
            }
        }
    }

    /// Create an account, then log in with the same credentials. The result
    /// is exactly the login result.
    pub async fn register(&self, registration: &Registration) -> Result<Identity, SessionError> {
        registration.validate()?;

        if let Err(e) = self.identity.register(registration).await {
            tracing::warn!(username = %registration.username, "Registration rejected: {}", e);
            return Err(SessionError::RegistrationFailed {
                reason: registration_failure_reason(&e),
            });
        }

        tracing::info!(
            username = %registration.username,
            role = %registration.role,
            "Account registered"
        );
        self.login(&registration.username, &registration.password)
            .await
    }

    /// Drop stored tokens and end the session. A storage failure is logged;
    /// the session ends regardless.
    pub async fn logout(&self) {
        self.discard_credentials().await;
        self.publish(AuthState::Unauthenticated);
        tracing::info!("User logged out");
    }

    /// End the session after the gateway has given up on refreshing it.
    /// Stored tokens are the caller's responsibility.
    pub fn expire(&self) {
        if self.is_authenticated() {
            tracing::info!("Session expired");
        }
        self.publish(AuthState::Unauthenticated);
    }

    async fn discard_credentials(&self) {
        if let Err(e) = self.store.clear_tokens().await {
            tracing::error!("Failed to clear stored credentials: {}", e);
        }
    }

    fn publish(&self, state: AuthState) -> AuthState {
        self.state.send_replace(state.clone());
        state
    }
}

fn login_failure(error: &IdentityError) -> SessionError {
    tracing::warn!("Login failed: {}", error);
    let reason = error
        .payload()
        .and_then(|payload| payload.detail())
        .unwrap_or(LOGIN_FAILED)
        .to_string();
    SessionError::InvalidCredentials { reason }
}

fn registration_failure_reason(error: &IdentityError) -> String {
    let Some(payload) = error.payload() else {
        return REGISTRATION_FAILED.to_string();
    };
    payload
        .first_field_error(&REGISTRATION_FIELDS)
        .unwrap_or_else(|| payload.to_string())
}
