//! Typed operations on audit requests.
//!
//! Each mutating call checks the caller's role against the workflow rules
//! before anything is sent; the backend stays the final authority.

use crate::gateway::{ApiGateway, ApiRequest, FormField, GatewayError};
use crate::models::{
    Attachment, AuditRequest, AuditStatus, Document, DocumentCategory, DocumentUpload, Identity,
    NewAuditRequest, NewRemark, Remark, SubmissionDocument,
};
use crate::session::SessionManager;
use crate::workflow::{self, Worklist, WorkflowError};
use futures::future::try_join_all;
use service_core::error::FieldLabel;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

const REQUESTS_PATH: &str = "audit-management/requests/";
const DOCUMENTS_PATH: &str = "audit-management/documents/";

pub const STATUS_FIELDS: &[FieldLabel<'static>] = &[("status", "Status")];
pub const UPLOAD_FIELDS: &[FieldLabel<'static>] =
    &[("file", "File"), ("document_type", "Document Type")];
pub const REMARK_FIELDS: &[FieldLabel<'static>] = &[("comment", "Remark")];
pub const CREATE_FIELDS: &[FieldLabel<'static>] = &[
    ("service_provider_name", "Service Provider Name"),
    ("data_center_location", "Data Center Location"),
];

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ClientError {
    pub fn user_message(&self, fields: &[FieldLabel<'_>]) -> String {
        match self {
            ClientError::NotAuthenticated => "Please log in to continue.".to_string(),
            ClientError::Workflow(e) => e.to_string(),
            ClientError::Validation(errors) => errors
                .field_errors()
                .values()
                .flat_map(|errors| errors.iter())
                .find_map(|error| error.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| self.to_string()),
            ClientError::Gateway(e) => e.user_message(fields),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::Gateway(e) if e.is_session_expired())
    }
}

pub struct AuditClient {
    gateway: ApiGateway,
    session: Arc<SessionManager>,
}

impl AuditClient {
    pub fn new(gateway: ApiGateway, session: Arc<SessionManager>) -> Self {
        Self { gateway, session }
    }

    fn identity(&self) -> Result<Identity, ClientError> {
        self.session.identity().ok_or(ClientError::NotAuthenticated)
    }

    pub async fn list_requests(&self) -> Result<Vec<AuditRequest>, ClientError> {
        let requests: Vec<AuditRequest> = self
            .gateway
            .send_json(&ApiRequest::get(REQUESTS_PATH))
            .await?;
        tracing::debug!(count = requests.len(), "Fetched audit requests");
        Ok(requests)
    }

    pub async fn get_request(&self, id: i64) -> Result<AuditRequest, ClientError> {
        let request: AuditRequest = self
            .gateway
            .send_json(&ApiRequest::get(request_path(id, "")))
            .await?;
        check_certificate(&request);
        Ok(request)
    }

    /// The caller's requests, split the way their dashboard shows them.
    pub async fn worklist(&self) -> Result<Worklist, ClientError> {
        let identity = self.identity()?;
        let requests = self.list_requests().await?;
        Ok(workflow::worklist(identity.role, requests))
    }

    pub async fn create_request(
        &self,
        request: &NewAuditRequest,
    ) -> Result<AuditRequest, ClientError> {
        let identity = self.identity()?;
        workflow::ensure_can_create(identity.role)?;
        request.validate()?;

        let body = serde_json::to_value(request).map_err(|e| GatewayError::Transport {
            status: None,
            payload: None,
            message: format!("Failed to encode request: {}", e),
        })?;
        let created: AuditRequest = self
            .gateway
            .send_json(&ApiRequest::post(REQUESTS_PATH).json(body))
            .await?;

        tracing::info!(
            request_id = created.id,
            provider = %created.service_provider_name,
            "Audit request created"
        );
        Ok(created)
    }

    /// Create a request and attach `documents` to it, each under its own
    /// name. Every document must have a name and a file before anything is
    /// sent. Uploads run concurrently; the first failure is returned. The
    /// request is re-read afterwards so the result lists the documents.
    pub async fn submit_request(
        &self,
        request: &NewAuditRequest,
        documents: Vec<SubmissionDocument>,
    ) -> Result<AuditRequest, ClientError> {
        let identity = self.identity()?;
        workflow::ensure_can_create(identity.role)?;
        request.validate()?;
        for document in &documents {
            document.validate()?;
        }

        for category in DocumentCategory::ALL {
            let count = documents.iter().filter(|d| d.category == category).count();
            if count < category.expected_documents() {
                tracing::debug!(
                    category = %category,
                    count,
                    expected = category.expected_documents(),
                    "Submitting fewer documents than the form offers"
                );
            }
        }

        let created = self.create_request(request).await?;
        if documents.is_empty() {
            return Ok(created);
        }

        let uploads = documents.into_iter().map(|document| {
            let fields = vec![
                FormField::text("audit_request", created.id.to_string()),
                FormField::text("document_type", document.name),
                FormField::file("file", document.file),
            ];
            let gateway = self.gateway.clone();
            async move {
                gateway
                    .send_json::<Document>(&ApiRequest::post(DOCUMENTS_PATH).multipart(fields))
                    .await
            }
        });
        let documents = try_join_all(uploads).await?;

        tracing::info!(
            request_id = created.id,
            documents = documents.len(),
            "Submission documents uploaded"
        );
        self.get_request(created.id).await
    }

    /// Move `request` to `next`. Approval carries the certificate as a
    /// multipart upload; every other transition is plain JSON.
    pub async fn update_status(
        &self,
        request: &AuditRequest,
        next: AuditStatus,
        certificate: Option<Attachment>,
    ) -> Result<AuditRequest, ClientError> {
        let identity = self.identity()?;
        workflow::validate_transition(identity.role, request.status, next, certificate.as_ref())?;

        let path = request_path(request.id, "status-update/");
        let call = match certificate {
            Some(certificate) => ApiRequest::patch(path).multipart(vec![
                FormField::text("status", next.as_str()),
                FormField::file("certificate_of_empanelment", certificate),
            ]),
            None => ApiRequest::patch(path).json(serde_json::json!({ "status": next })),
        };

        let updated: AuditRequest = self.gateway.send_json(&call).await?;
        check_certificate(&updated);
        tracing::info!(
            request_id = request.id,
            from = %request.status,
            to = %updated.status,
            role = %identity.role,
            "Audit request status updated"
        );
        Ok(updated)
    }

    pub async fn upload_document(
        &self,
        request: &AuditRequest,
        upload: DocumentUpload,
    ) -> Result<Document, ClientError> {
        let identity = self.identity()?;
        workflow::ensure_can_upload(&identity, request)?;
        upload.validate()?;
        workflow::ensure_can_upload_type(identity.role, &upload.document_type)?;

        let mut fields = vec![FormField::text("document_type", upload.document_type)];
        if let Some(description) = upload.description {
            fields.push(FormField::text("description", description));
        }
        fields.push(FormField::file("file", upload.file));

        let document: Document = self
            .gateway
            .send_json(&ApiRequest::post(request_path(request.id, "documents/upload/")).multipart(fields))
            .await?;
        tracing::info!(
            request_id = request.id,
            document_id = document.id,
            document_type = %document.document_type,
            "Document uploaded"
        );
        Ok(document)
    }

    pub async fn delete_document(&self, document: &Document) -> Result<(), ClientError> {
        let identity = self.identity()?;
        workflow::ensure_can_delete(&identity, document)?;

        self.gateway
            .send_empty(&ApiRequest::delete(format!(
                "{}{}/delete/",
                DOCUMENTS_PATH, document.id
            )))
            .await?;
        tracing::info!(document_id = document.id, "Document deleted");
        Ok(())
    }

    pub async fn add_remark(
        &self,
        request: &AuditRequest,
        remark: &NewRemark,
    ) -> Result<Remark, ClientError> {
        let identity = self.identity()?;
        workflow::ensure_can_remark(identity.role)?;
        remark.validate()?;

        let added: Remark = self
            .gateway
            .send_json(
                &ApiRequest::post(request_path(request.id, "remarks/add/"))
                    .json(serde_json::json!({ "comment": remark.comment })),
            )
            .await?;
        tracing::info!(request_id = request.id, remark_id = added.id, "Remark added");
        Ok(added)
    }
}

/// Certificates only belong on approved requests. A record that breaks this
/// is still returned; the backend owns the data.
fn check_certificate(request: &AuditRequest) {
    if !request.has_consistent_certificate() {
        tracing::warn!(
            request_id = request.id,
            status = %request.status,
            "Certificate present on a request that is not approved"
        );
    }
}

fn request_path(id: i64, suffix: &str) -> String {
    format!("{}{}/{}", REQUESTS_PATH, id, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiSettings;
    use crate::credentials::{CredentialStore, MemoryCredentialStore};
    use crate::models::{Role, UserSummary};
    use crate::services::identity_client::IdentityClient;
    use crate::test_support::mint_token;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_json(id: i64, role: Role) -> serde_json::Value {
        json!({"id": id, "username": format!("user{}", id), "role": role.as_str()})
    }

    fn request_json(id: i64, status: AuditStatus) -> serde_json::Value {
        json!({
            "id": id,
            "csp": {"id": 3, "username": "acme"},
            "service_provider_name": "Acme Cloud",
            "data_center_location": "Pune",
            "status": status.as_str(),
            "request_date": "2024-05-01T10:00:00Z",
            "last_updated": "2024-05-02T10:00:00Z"
        })
    }

    fn request(id: i64, status: AuditStatus) -> AuditRequest {
        serde_json::from_value(request_json(id, status)).unwrap()
    }

    async fn client_as(server: &MockServer, id: i64, role: Role) -> AuditClient {
        Mock::given(method("GET"))
            .and(path("/api/users/me/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json(id, role)))
            .mount(server)
            .await;

        let api = ApiSettings::new(format!("{}/api/", server.uri()));
        let client = reqwest::Client::new();
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .store_tokens(&mint_token(3600, id), Some("refresh-1"))
            .await
            .unwrap();
        let identity = Arc::new(IdentityClient::new(client.clone(), api.clone()));
        let session = Arc::new(SessionManager::new(store.clone(), identity.clone()));
        session.restore().await;
        assert!(session.is_authenticated());

        let gateway = ApiGateway::new(client, api, store, identity, session.clone());
        AuditClient::new(gateway, session)
    }

    async fn unauthenticated(server: &MockServer) -> AuditClient {
        let api = ApiSettings::new(format!("{}/api/", server.uri()));
        let client = reqwest::Client::new();
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
        let identity = Arc::new(IdentityClient::new(client.clone(), api.clone()));
        let session = Arc::new(SessionManager::new(store.clone(), identity.clone()));
        session.restore().await;
        AuditClient::new(ApiGateway::new(client, api, store, identity, session.clone()), session)
    }

    #[tokio::test]
    async fn forwarding_sends_json_status() {
        let server = MockServer::start().await;
        let client = client_as(&server, 4, Role::MeityReviewer).await;
        Mock::given(method("PATCH"))
            .and(path("/api/audit-management/requests/12/status-update/"))
            .and(body_json(json!({"status": "Forwarded_to_STQC"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(request_json(12, AuditStatus::ForwardedToStqc)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let updated = client
            .update_status(
                &request(12, AuditStatus::SubmittedByCsp),
                AuditStatus::ForwardedToStqc,
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.status, AuditStatus::ForwardedToStqc);
    }

    #[tokio::test]
    async fn approval_without_certificate_never_reaches_the_network() {
        let server = MockServer::start().await;
        let client = client_as(&server, 6, Role::ScientistF).await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client
            .update_status(
                &request(12, AuditStatus::AuditCompletedByStqc),
                AuditStatus::ApprovedByScientistF,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Workflow(WorkflowError::MissingCertificate)
        ));
    }

    #[tokio::test]
    async fn approval_uploads_certificate_as_multipart() {
        let server = MockServer::start().await;
        let client = client_as(&server, 6, Role::ScientistF).await;
        Mock::given(method("PATCH"))
            .and(path("/api/audit-management/requests/12/status-update/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(request_json(
                12,
                AuditStatus::ApprovedByScientistF,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let updated = client
            .update_status(
                &request(12, AuditStatus::AuditCompletedByStqc),
                AuditStatus::ApprovedByScientistF,
                Some(Attachment::pdf("acme.pdf", b"%PDF-1.4".to_vec())),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, AuditStatus::ApprovedByScientistF);

        let received = server.received_requests().await.unwrap();
        let patch = received
            .iter()
            .find(|r| r.method.to_string() == "PATCH")
            .unwrap();
        let body = String::from_utf8_lossy(&patch.body);
        assert!(body.contains("name=\"certificate_of_empanelment\""));
        assert!(body.contains("Approved_by_ScientistF"));
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected_locally() {
        let server = MockServer::start().await;
        let client = client_as(&server, 4, Role::MeityReviewer).await;

        let err = client
            .update_status(
                &request(12, AuditStatus::ForwardedToStqc),
                AuditStatus::ForwardedToStqc,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Workflow(WorkflowError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn backend_status_errors_are_described() {
        let server = MockServer::start().await;
        let client = client_as(&server, 4, Role::MeityReviewer).await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": ["Request was already forwarded."]
            })))
            .mount(&server)
            .await;

        let err = client
            .update_status(
                &request(12, AuditStatus::SubmittedByCsp),
                AuditStatus::ForwardedToStqc,
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message(STATUS_FIELDS),
            "Status: Request was already forwarded."
        );
    }

    #[tokio::test]
    async fn csp_cannot_remark() {
        let server = MockServer::start().await;
        let client = client_as(&server, 3, Role::Csp).await;

        let err = client
            .add_remark(
                &request(12, AuditStatus::SubmittedByCsp),
                &NewRemark::new("Looks fine"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Workflow(WorkflowError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn blank_remark_fails_validation() {
        let server = MockServer::start().await;
        let client = client_as(&server, 7, Role::StqcAuditor).await;

        let err = client
            .add_remark(
                &request(12, AuditStatus::ForwardedToStqc),
                &NewRemark::new("   "),
            )
            .await
            .unwrap_err();
        assert_eq!(err.user_message(REMARK_FIELDS), "Remark cannot be empty");
    }

    #[tokio::test]
    async fn auditor_adds_remark() {
        let server = MockServer::start().await;
        let client = client_as(&server, 7, Role::StqcAuditor).await;
        Mock::given(method("POST"))
            .and(path("/api/audit-management/requests/12/remarks/add/"))
            .and(body_json(json!({"comment": "Site visit scheduled"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 30,
                "comment": "Site visit scheduled",
                "author": {"id": 7, "username": "user7"},
                "timestamp": "2024-05-03T09:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let remark = client
            .add_remark(
                &request(12, AuditStatus::ForwardedToStqc),
                &NewRemark::new("  Site visit scheduled "),
            )
            .await
            .unwrap();
        assert_eq!(remark.id, 30);
    }

    #[tokio::test]
    async fn only_uploader_deletes_document() {
        let server = MockServer::start().await;
        let client = client_as(&server, 3, Role::Csp).await;
        Mock::given(method("DELETE"))
            .and(path("/api/audit-management/documents/40/delete/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut document = Document {
            id: 40,
            document_type: "CSP_Submission".to_string(),
            description: None,
            uploaded_by: UserSummary {
                id: 3,
                username: "acme".to_string(),
                role: Some(Role::Csp),
                organization: None,
            },
            upload_date: Utc::now(),
            file_url: None,
        };
        client.delete_document(&document).await.unwrap();

        document.uploaded_by.id = 99;
        assert!(matches!(
            client.delete_document(&document).await,
            Err(ClientError::Workflow(WorkflowError::Forbidden { .. }))
        ));
    }

    #[tokio::test]
    async fn submit_creates_then_uploads_each_file() {
        let server = MockServer::start().await;
        let client = client_as(&server, 3, Role::Csp).await;
        Mock::given(method("POST"))
            .and(path("/api/audit-management/requests/"))
            .and(body_json(json!({
                "service_provider_name": "Acme Cloud",
                "data_center_location": "Pune",
                "status": "Submitted_by_CSP"
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(request_json(12, AuditStatus::SubmittedByCsp)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/audit-management/documents/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 41,
                "document_type": "CSP_Submission",
                "uploaded_by": {"id": 3, "username": "acme"},
                "upload_date": "2024-05-01T10:05:00Z"
            })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/audit-management/requests/12/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(request_json(12, AuditStatus::SubmittedByCsp)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let submitted = client
            .submit_request(
                &NewAuditRequest::new(" Acme Cloud ", "Pune"),
                vec![
                    SubmissionDocument::new(
                        DocumentCategory::Prequalification,
                        "Company profile",
                        Attachment::pdf("profile.pdf", b"%PDF-1.4".to_vec()),
                    ),
                    SubmissionDocument::new(
                        DocumentCategory::Technical,
                        " Network diagram ",
                        Attachment::new("network.bin", vec![0x25, 0x50]),
                    ),
                ],
            )
            .await
            .unwrap();
        assert_eq!(submitted.id, 12);

        let received = server.received_requests().await.unwrap();
        let bodies: Vec<String> = received
            .iter()
            .filter(|r| r.url.path() == "/api/audit-management/documents/")
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect();
        assert_eq!(bodies.len(), 2);
        for name in ["Company profile", "Network diagram"] {
            assert!(bodies.iter().any(|body| body.contains(name)), "{}", name);
        }
        assert!(bodies.iter().all(|body| body.contains("application/pdf")));
    }

    #[tokio::test]
    async fn unnamed_submission_document_sends_nothing() {
        let server = MockServer::start().await;
        let client = client_as(&server, 3, Role::Csp).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = client
            .submit_request(
                &NewAuditRequest::new("Acme Cloud", "Pune"),
                vec![
                    SubmissionDocument::new(
                        DocumentCategory::Standard,
                        "ISO 27001",
                        Attachment::pdf("iso.pdf", b"%PDF".to_vec()),
                    ),
                    SubmissionDocument::new(
                        DocumentCategory::Standard,
                        "   ",
                        Attachment::pdf("soc2.pdf", b"%PDF".to_vec()),
                    ),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(err.user_message(CREATE_FIELDS), "Every document needs a name");
    }

    #[tokio::test]
    async fn csp_cannot_upload_audit_report() {
        let server = MockServer::start().await;
        let client = client_as(&server, 3, Role::Csp).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = client
            .upload_document(
                &request(12, AuditStatus::SubmittedByCsp),
                DocumentUpload::new("Audit_Report", Attachment::pdf("r.pdf", b"%PDF".to_vec())),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Workflow(WorkflowError::DocumentTypeNotAllowed { .. })
        ));
    }

    #[tokio::test]
    async fn csp_uploads_submission_document() {
        let server = MockServer::start().await;
        let client = client_as(&server, 3, Role::Csp).await;
        Mock::given(method("POST"))
            .and(path("/api/audit-management/requests/12/documents/upload/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 42,
                "document_type": "CSP_Submission",
                "uploaded_by": {"id": 3, "username": "acme"},
                "upload_date": "2024-05-01T10:05:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let document = client
            .upload_document(
                &request(12, AuditStatus::SubmittedByCsp),
                DocumentUpload::new("CSP_Submission", Attachment::pdf("p.pdf", b"%PDF".to_vec())),
            )
            .await
            .unwrap();
        assert_eq!(document.id, 42);
    }

    #[tokio::test]
    async fn inconsistent_certificate_is_still_returned() {
        let server = MockServer::start().await;
        let client = client_as(&server, 4, Role::MeityReviewer).await;
        let mut body = request_json(12, AuditStatus::RejectedByScientistF);
        body["certificate_of_empanelment"] = json!("https://files.example/cert.pdf");
        Mock::given(method("GET"))
            .and(path("/api/audit-management/requests/12/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let record = client.get_request(12).await.unwrap();
        assert!(!record.has_consistent_certificate());
        assert!(record.status.is_terminal());
    }

    #[tokio::test]
    async fn whitespace_remark_built_directly_is_not_sent() {
        let server = MockServer::start().await;
        let client = client_as(&server, 7, Role::StqcAuditor).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = client
            .add_remark(
                &request(12, AuditStatus::ForwardedToStqc),
                &NewRemark {
                    comment: "   ".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.user_message(REMARK_FIELDS), "Remark cannot be empty");
    }

    #[tokio::test]
    async fn reviewers_cannot_create_requests() {
        let server = MockServer::start().await;
        let client = client_as(&server, 4, Role::MeityReviewer).await;

        let err = client
            .create_request(&NewAuditRequest::new("Acme Cloud", "Pune"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Workflow(_)));
    }

    #[tokio::test]
    async fn unauthenticated_calls_fail_before_the_network() {
        let server = MockServer::start().await;
        let client = unauthenticated(&server).await;

        let err = client
            .add_remark(
                &request(12, AuditStatus::ForwardedToStqc),
                &NewRemark::new("hello"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reviewer_worklist_is_split() {
        let server = MockServer::start().await;
        let client = client_as(&server, 4, Role::MeityReviewer).await;
        Mock::given(method("GET"))
            .and(path("/api/audit-management/requests/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                request_json(1, AuditStatus::SubmittedByCsp),
                request_json(2, AuditStatus::ForwardedToStqc),
                request_json(3, AuditStatus::ApprovedByScientistF),
            ])))
            .mount(&server)
            .await;

        let list = client.worklist().await.unwrap();
        assert_eq!(list.pending.len(), 1);
        assert_eq!(list.reviewed.len(), 2);
    }
}
