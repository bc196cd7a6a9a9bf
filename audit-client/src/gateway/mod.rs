//! Authenticated access to the backing store.
//!
//! Every call reads the access token from the credential store when it is
//! sent. A 401 hands the rejected token to the refresh coordinator and the
//! call is sent once more with the replacement. A call is never retried
//! twice.

mod refresh;
mod request;

pub use refresh::RefreshFailure;
pub use request::{ApiRequest, FormField, RequestBody};

use crate::config::ApiSettings;
use crate::credentials::{CredentialError, CredentialStore};
use crate::services::identity_client::IdentityClient;
use crate::session::SessionManager;
use refresh::RefreshCoordinator;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use service_core::error::{ErrorPayload, FieldLabel};
use service_core::observability::TracedClientExt;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

const REQUEST_FAILED: &str = "Request failed. Please try again.";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The refresh exchange failed; stored tokens are gone and the session
    /// has ended.
    #[error("Session expired: {0}")]
    SessionExpired(RefreshFailure),

    #[error("{message}")]
    Transport {
        status: Option<StatusCode>,
        payload: Option<ErrorPayload>,
        message: String,
    },

    #[error(transparent)]
    Storage(#[from] CredentialError),
}

impl GatewayError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Transport { status, .. } => *status,
            GatewayError::SessionExpired(_) | GatewayError::Storage(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            GatewayError::Transport { payload, .. } => payload.as_ref(),
            GatewayError::SessionExpired(_) | GatewayError::Storage(_) => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, GatewayError::SessionExpired(_))
    }

    /// Message for the user: the backend's field errors (in `fields` order),
    /// its `detail`, or a bare string body, before falling back to a generic
    /// line.
    pub fn user_message(&self, fields: &[FieldLabel<'_>]) -> String {
        match self {
            GatewayError::SessionExpired(_) => {
                "Your session has expired. Please log in again.".to_string()
            }
            GatewayError::Transport { payload, .. } => payload
                .as_ref()
                .and_then(|payload| payload.describe(fields))
                .unwrap_or_else(|| REQUEST_FAILED.to_string()),
            GatewayError::Storage(_) => REQUEST_FAILED.to_string(),
        }
    }

    fn transport(error: reqwest::Error) -> Self {
        GatewayError::Transport {
            status: error.status(),
            payload: None,
            message: format!("HTTP request failed: {}", error),
        }
    }

    async fn from_response(response: Response) -> Self {
        let status = response.status();
        let payload = match response.bytes().await {
            Ok(body) => ErrorPayload::from_body(&body),
            Err(e) => {
                tracing::warn!(status = %status, error = %e, "Failed to read error body");
                None
            }
        };
        GatewayError::Transport {
            status: Some(status),
            payload,
            message: format!("Request failed with status {}", status),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    AfterRefresh,
}

impl Attempt {
    fn may_refresh(self) -> bool {
        self == Attempt::Initial
    }

    fn as_str(self) -> &'static str {
        match self {
            Attempt::Initial => "initial",
            Attempt::AfterRefresh => "after_refresh",
        }
    }
}

struct GatewayInner {
    client: Client,
    api: ApiSettings,
    store: Arc<dyn CredentialStore>,
    refresh: RefreshCoordinator,
}

#[derive(Clone)]
pub struct ApiGateway {
    inner: Arc<GatewayInner>,
}

impl ApiGateway {
    pub fn new(
        client: Client,
        api: ApiSettings,
        store: Arc<dyn CredentialStore>,
        identity: Arc<IdentityClient>,
        session: Arc<SessionManager>,
    ) -> Self {
        let refresh =
            RefreshCoordinator::new(store.clone(), identity, session, api.refresh_timeout());
        Self {
            inner: Arc::new(GatewayInner {
                client,
                api,
                store,
                refresh,
            }),
        }
    }

    /// Send `request`, refreshing the access token once on a 401. Both
    /// attempts carry the same `x-request-id`.
    #[instrument(
        name = "api_call",
        skip_all,
        fields(
            method = %request.method(),
            path = %request.path(),
            request_id = tracing::field::Empty
        )
    )]
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, GatewayError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let mut token = self.inner.store.access_token().await?;
        let mut attempt = Attempt::Initial;

        loop {
            let response = self
                .dispatch(request, &request_id, token.as_deref(), attempt)
                .await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status != StatusCode::UNAUTHORIZED || !attempt.may_refresh() {
                tracing::warn!(status = %status, attempt = attempt.as_str(), "Backend rejected request");
                return Err(GatewayError::from_response(response).await);
            }

            let unauthorized = GatewayError::from_response(response).await;
            token = match self.inner.refresh.replacement_for(token.as_deref()).await {
                Ok(fresh) => Some(fresh),
                Err(RefreshFailure::MissingRefreshToken) => return Err(unauthorized),
                Err(failure) => return Err(GatewayError::SessionExpired(failure)),
            };
            attempt = Attempt::AfterRefresh;
        }
    }

    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, GatewayError> {
        let response = self.send(request).await?;
        let status = response.status();
        response.json::<T>().await.map_err(|e| {
            tracing::error!("Failed to decode response from {}: {}", request.path(), e);
            GatewayError::Transport {
                status: Some(status),
                payload: None,
                message: format!("Failed to decode response: {}", e),
            }
        })
    }

    /// Send `request` and discard the response body.
    pub async fn send_empty(&self, request: &ApiRequest) -> Result<(), GatewayError> {
        self.send(request).await.map(|_| ())
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        request_id: &str,
        token: Option<&str>,
        attempt: Attempt,
    ) -> Result<Response, GatewayError> {
        let url = self.inner.api.url(request.path());

        let mut builder = self
            .inner
            .client
            .traced_request(request.method().clone(), &url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(fields) => {
                builder.multipart(request::build_form(fields).map_err(GatewayError::transport)?)
            }
        };

        tracing::debug!(attempt = attempt.as_str(), authenticated = token.is_some(), "Sending request");

        builder.send_with_request_id(request_id).await.map_err(|e| {
            tracing::error!("Failed to send {} request to {}: {}", request.method(), url, e);
            GatewayError::transport(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::session::AuthState;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LIST: &str = "/api/audit-management/requests/";

    struct Harness {
        gateway: ApiGateway,
        session: Arc<SessionManager>,
        store: Arc<MemoryCredentialStore>,
    }

    async fn harness(server: &MockServer, refresh_timeout_secs: u64) -> Harness {
        let mut api = ApiSettings::new(format!("{}/api/", server.uri()));
        api.refresh_timeout_secs = refresh_timeout_secs;
        let client = Client::new();
        let store = Arc::new(MemoryCredentialStore::new());
        let identity = Arc::new(IdentityClient::new(client.clone(), api.clone()));
        let session = Arc::new(SessionManager::new(store.clone(), identity.clone()));
        let gateway = ApiGateway::new(client, api, store.clone(), identity, session.clone());
        Harness {
            gateway,
            session,
            store,
        }
    }

    async fn mount_list(server: &MockServer, token: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(LIST))
            .and(header("authorization", format!("Bearer {}", token).as_str()))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!([])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn success_passes_through_with_bearer() {
        let server = MockServer::start().await;
        mount_list(&server, "live", 200).await;
        let h = harness(&server, 10).await;
        h.store.store_tokens("live", Some("r-1")).await.unwrap();

        let body: Vec<serde_json::Value> = h
            .gateway
            .send_json(&ApiRequest::get("audit-management/requests/"))
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn concurrent_401s_share_one_refresh() {
        let server = MockServer::start().await;
        mount_list(&server, "stale", 401).await;
        mount_list(&server, "fresh", 200).await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access": "fresh", "refresh": "r-2"}))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let h = harness(&server, 10).await;
        h.store.store_tokens("stale", Some("r-1")).await.unwrap();

        let request = ApiRequest::get("audit-management/requests/");
        let calls = (0..5).map(|_| h.gateway.send_empty(&request));
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(Result::is_ok));
        let tokens = h.store.tokens().await.unwrap();
        assert_eq!(tokens.access.as_deref(), Some("fresh"));
        assert_eq!(tokens.refresh.as_deref(), Some("r-2"));
    }

    #[tokio::test]
    async fn failed_refresh_expires_every_waiter() {
        let server = MockServer::start().await;
        mount_list(&server, "stale", 401).await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"detail": "Token is invalid or expired"}))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let h = harness(&server, 10).await;
        h.store.store_tokens("stale", Some("r-1")).await.unwrap();

        let request = ApiRequest::get("audit-management/requests/");
        let results =
            futures::future::join_all((0..3).map(|_| h.gateway.send_empty(&request))).await;

        for result in results {
            match result {
                Err(GatewayError::SessionExpired(failure)) => assert_eq!(
                    failure,
                    RefreshFailure::Rejected("Token is invalid or expired".to_string())
                ),
                other => panic!("expected session expiry, got {:?}", other),
            }
        }
        assert_eq!(h.store.tokens().await.unwrap(), Default::default());
        assert_eq!(h.session.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn late_arrival_sees_the_same_failure() {
        let server = MockServer::start().await;
        mount_list(&server, "stale", 401).await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        let h = harness(&server, 10).await;
        h.store.store_tokens("stale", Some("r-1")).await.unwrap();

        let first = h
            .gateway
            .inner
            .refresh
            .replacement_for(Some("stale"))
            .await
            .unwrap_err();
        let late = h
            .gateway
            .inner
            .refresh
            .replacement_for(Some("stale"))
            .await
            .unwrap_err();
        assert_eq!(first, late);
    }

    #[tokio::test]
    async fn missing_refresh_token_propagates_the_401() {
        let server = MockServer::start().await;
        mount_list(&server, "stale", 401).await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let h = harness(&server, 10).await;
        h.store.set(crate::credentials::ACCESS_TOKEN_KEY, "stale").await.unwrap();

        let err = h
            .gateway
            .send_empty(&ApiRequest::get("audit-management/requests/"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(!err.is_session_expired());
        assert_eq!(
            h.store.access_token().await.unwrap().as_deref(),
            Some("stale")
        );
    }

    #[tokio::test]
    async fn retried_call_is_not_refreshed_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LIST))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;
        let h = harness(&server, 10).await;
        h.store.store_tokens("stale", Some("r-1")).await.unwrap();

        let err = h
            .gateway
            .send_empty(&ApiRequest::get("audit-management/requests/"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(h.store.refresh_token().await.unwrap().as_deref(), Some("r-1"));
    }

    #[tokio::test]
    async fn slow_refresh_times_out_as_expiry() {
        let server = MockServer::start().await;
        mount_list(&server, "stale", 401).await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access": "fresh"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
        let h = harness(&server, 1).await;
        h.store.store_tokens("stale", Some("r-1")).await.unwrap();

        let err = h
            .gateway
            .send_empty(&ApiRequest::get("audit-management/requests/"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::SessionExpired(RefreshFailure::TimedOut(_))
        ));
        assert_eq!(h.store.tokens().await.unwrap(), Default::default());
    }

    #[tokio::test]
    async fn non_401_failures_carry_the_payload() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/audit-management/requests/9/status-update/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": ["Invalid status transition."]
            })))
            .mount(&server)
            .await;
        let h = harness(&server, 10).await;
        h.store.store_tokens("live", Some("r-1")).await.unwrap();

        let err = h
            .gateway
            .send_empty(
                &ApiRequest::patch("audit-management/requests/9/status-update/")
                    .json(json!({"status": "Forwarded_to_STQC"})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(
            err.user_message(&[("status", "Status")]),
            "Status: Invalid status transition."
        );
    }
}
