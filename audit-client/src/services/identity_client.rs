use crate::config::ApiSettings;
use crate::models::{Identity, Registration};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use service_core::error::ErrorPayload;
use service_core::observability::TracedClientExt;
use std::fmt;
use thiserror::Error;

const TOKEN_PATH: &str = "token/";
const REFRESH_PATH: &str = "token/refresh/";
const CURRENT_USER_PATH: &str = "users/me/";
const REGISTER_PATH: &str = "users/register/";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity provider rejected the request ({status})")]
    Rejected {
        status: StatusCode,
        payload: Option<ErrorPayload>,
    },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl IdentityError {
    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            IdentityError::Rejected { payload, .. } => payload.as_ref(),
            IdentityError::Transport(_) => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            IdentityError::Rejected { status, .. } => Some(*status),
            IdentityError::Transport(e) => e.status(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Answer to a refresh exchange. Providers that rotate refresh tokens send
/// a new one alongside the access token.
#[derive(Clone, Deserialize)]
pub struct RefreshedToken {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_len", &self.access.len())
            .field("refresh_len", &self.refresh.len())
            .finish()
    }
}

impl fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("access_len", &self.access.len())
            .field("rotated", &self.refresh.is_some())
            .finish()
    }
}

/// Client for the identity provider's token and user endpoints.
pub struct IdentityClient {
    client: Client,
    api: ApiSettings,
}

impl IdentityClient {
    pub fn new(client: Client, api: ApiSettings) -> Self {
        Self { client, api }
    }

    pub fn base_url(&self) -> &str {
        &self.api.base_url
    }

    /// Exchange username and password for an access/refresh pair.
    pub async fn obtain_token(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, IdentityError> {
        let url = self.api.url(TOKEN_PATH);

        let response = self
            .client
            .traced_post(&url)
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                IdentityError::Transport(e)
            })?;

        read_json(response).await
    }

    /// Redeem a refresh token for a new access token.
    pub async fn refresh_token(&self, refresh: &str) -> Result<RefreshedToken, IdentityError> {
        let url = self.api.url(REFRESH_PATH);

        let response = self
            .client
            .traced_post(&url)
            .json(&serde_json::json!({ "refresh": refresh }))
            .timeout(self.api.refresh_timeout())
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                IdentityError::Transport(e)
            })?;

        read_json(response).await
    }

    /// Fetch the identity the access token belongs to.
    pub async fn current_user(&self, access_token: &str) -> Result<Identity, IdentityError> {
        let url = self.api.url(CURRENT_USER_PATH);

        let response = self
            .client
            .traced_get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send GET request to {}: {}", url, e);
                IdentityError::Transport(e)
            })?;

        read_json(response).await
    }

    /// Create an account. The provider's answer carries no tokens; callers
    /// log in afterwards.
    pub async fn register(&self, registration: &Registration) -> Result<(), IdentityError> {
        let url = self.api.url(REGISTER_PATH);

        let response = self
            .client
            .traced_post(&url)
            .json(registration)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                IdentityError::Transport(e)
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(rejection(response).await)
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, IdentityError> {
    if !response.status().is_success() {
        return Err(rejection(response).await);
    }
    Ok(response.json::<T>().await?)
}

async fn rejection(response: Response) -> IdentityError {
    let status = response.status();
    let payload = match response.bytes().await {
        Ok(body) => ErrorPayload::from_body(&body),
        Err(e) => {
            tracing::warn!(status = %status, error = %e, "Failed to read error body");
            None
        }
    };

    tracing::debug!(status = %status, has_payload = payload.is_some(), "Identity provider rejected request");
    IdentityError::Rejected { status, payload }
}
