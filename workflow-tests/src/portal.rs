//! In-process stand-in for the identity provider and the audit-management
//! backend.
//!
//! A single catch-all mock routes every call to [`PortalState`], which keeps
//! accounts, issued tokens and audit requests in memory and enforces the same
//! role rules the real backend does.

use crate::mint_token;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use wiremock::matchers::{any, header};
use wiremock::{Match, Mock, MockServer, Request, Respond, ResponseTemplate};

const ACCESS_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct Account {
    id: i64,
    username: String,
    password: String,
    email: String,
    role: String,
    organization: Option<String>,
}

impl Account {
    fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "role": self.role,
            "organization": self.organization,
        })
    }

    fn identity(&self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "email": self.email,
            "role": self.role,
            "organization": self.organization,
        })
    }
}

#[derive(Debug, Clone)]
struct AuditRecord {
    id: i64,
    csp: Value,
    csp_id: i64,
    service_provider_name: String,
    data_center_location: String,
    status: String,
    certificate: Option<String>,
    request_date: String,
    last_updated: String,
    documents: Vec<Value>,
    remarks: Vec<Value>,
}

impl AuditRecord {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "csp": self.csp,
            "service_provider_name": self.service_provider_name,
            "data_center_location": self.data_center_location,
            "status": self.status,
            "certificate_of_empanelment": self.certificate,
            "request_date": self.request_date,
            "last_updated": self.last_updated,
            "documents": self.documents,
            "remarks": self.remarks,
        })
    }
}

#[derive(Default)]
struct PortalState {
    accounts: Vec<Account>,
    access_tokens: HashMap<String, i64>,
    refresh_tokens: HashMap<String, i64>,
    requests: Vec<AuditRecord>,
    next_id: i64,
    issued: i64,
    refresh_calls: usize,
    refresh_delay: Duration,
    rotate_refresh_tokens: bool,
}

/// Handle to a running fake portal.
pub struct FakePortal {
    server: MockServer,
    state: Arc<Mutex<PortalState>>,
}

impl FakePortal {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(PortalState {
            next_id: 1,
            ..Default::default()
        }));

        Mock::given(any())
            .respond_with(PortalResponder(state.clone()))
            .mount(&server)
            .await;

        Self { server, state }
    }

    /// API root to configure the client with.
    pub fn base_url(&self) -> String {
        format!("{}/api/", self.server.uri())
    }

    fn state(&self) -> MutexGuard<'_, PortalState> {
        lock(&self.state)
    }

    /// Create an account directly, as an administrator would.
    pub fn add_account(&self, username: &str, password: &str, role: &str) -> i64 {
        let mut state = self.state();
        state.create_account(username, password, &format!("{}@example.gov", username), role, None)
    }

    /// Invalidate every issued access token; refresh tokens stay valid.
    pub fn expire_access_tokens(&self) {
        self.state().access_tokens.clear();
    }

    /// Invalidate every issued refresh token.
    pub fn revoke_refresh_tokens(&self) {
        self.state().refresh_tokens.clear();
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state().refresh_delay = delay;
    }

    pub fn rotate_refresh_tokens(&self, rotate: bool) {
        self.state().rotate_refresh_tokens = rotate;
    }

    /// Number of successful or failed `token/refresh/` exchanges.
    pub fn refresh_calls(&self) -> usize {
        self.state().refresh_calls
    }

    /// Number of requests the portal has received so far.
    pub async fn received(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

fn lock(state: &Mutex<PortalState>) -> MutexGuard<'_, PortalState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

struct PortalResponder(Arc<Mutex<PortalState>>);

impl Respond for PortalResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        lock(&self.0).handle(request)
    }
}

fn unauthorized() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "detail": "Given token not valid for any token type",
        "code": "token_not_valid"
    }))
}

fn forbidden() -> ResponseTemplate {
    ResponseTemplate::new(403).set_body_json(json!({
        "detail": "You do not have permission to perform this action."
    }))
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."}))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn json_body(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}

fn is_multipart(request: &Request) -> bool {
    String::from_utf8_lossy(&request.body).contains("Content-Disposition: form-data")
}

/// Value of a text field in a multipart body.
fn form_field(request: &Request, name: &str) -> Option<String> {
    let body = String::from_utf8_lossy(&request.body);
    let marker = format!("name=\"{}\"", name);
    let start = body.find(&marker)?;
    let rest = &body[start..];
    let value_start = rest.find("\r\n\r\n")? + 4;
    let value = &rest[value_start..];
    let value_end = value.find("\r\n")?;
    Some(value[..value_end].to_string())
}

fn has_form_file(request: &Request, name: &str) -> bool {
    String::from_utf8_lossy(&request.body).contains(&format!("name=\"{}\"; filename=", name))
}

fn next_status(role: &str, current: &str, proposed: &str) -> bool {
    matches!(
        (role, current, proposed),
        ("MeitY_Reviewer", "Submitted_by_CSP", "Forwarded_to_STQC")
            | ("STQC_Auditor", "Forwarded_to_STQC", "Audit_Completed_by_STQC")
            | ("Scientist_F", "Audit_Completed_by_STQC", "Approved_by_ScientistF")
            | ("Scientist_F", "Audit_Completed_by_STQC", "Rejected_by_ScientistF")
    )
}

impl PortalState {
    fn create_account(
        &mut self,
        username: &str,
        password: &str,
        email: &str,
        role: &str,
        organization: Option<String>,
    ) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.accounts.push(Account {
            id,
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            organization,
        });
        id
    }

    fn account(&self, id: i64) -> Option<&Account> {
        self.accounts.iter().find(|account| account.id == id)
    }

    fn issue_access(&mut self, user_id: i64) -> String {
        self.issued += 1;
        // Distinct expiry offsets keep every issued token unique.
        let token = mint_token(ACCESS_TTL_SECS + self.issued, user_id);
        self.access_tokens.insert(token.clone(), user_id);
        token
    }

    fn issue_refresh(&mut self, user_id: i64) -> String {
        self.issued += 1;
        let token = format!("refresh-{}-{}", user_id, self.issued);
        self.refresh_tokens.insert(token.clone(), user_id);
        token
    }

    fn caller(&self, request: &Request) -> Option<Account> {
        self.access_tokens
            .iter()
            .find(|(token, _)| {
                header("authorization", format!("Bearer {}", token).as_str()).matches(request)
            })
            .and_then(|(_, user_id)| self.account(*user_id).cloned())
    }

    fn handle(&mut self, request: &Request) -> ResponseTemplate {
        let method = request.method.to_string();
        let path = request.url.path().trim_start_matches("/api/").trim_end_matches('/').to_string();
        let segments: Vec<&str> = path.split('/').collect();

        match (method.as_str(), segments.as_slice()) {
            ("POST", ["token"]) => return self.obtain_token(request),
            ("POST", ["token", "refresh"]) => return self.refresh_token(request),
            ("POST", ["users", "register"]) => return self.register(request),
            _ => {}
        }

        let Some(caller) = self.caller(request) else {
            return unauthorized();
        };

        match (method.as_str(), segments.as_slice()) {
            ("GET", ["users", "me"]) => ResponseTemplate::new(200).set_body_json(caller.identity()),
            ("GET", ["audit-management", "requests"]) => self.list(&caller),
            ("POST", ["audit-management", "requests"]) => self.create(&caller, request),
            ("GET", ["audit-management", "requests", id]) => self.detail(id),
            ("PATCH", ["audit-management", "requests", id, "status-update"]) => {
                self.update_status(&caller, id, request)
            }
            ("POST", ["audit-management", "requests", id, "documents", "upload"]) => {
                let document_type = form_field(request, "document_type");
                let description = form_field(request, "description");
                self.attach(&caller, id, document_type, description, request)
            }
            ("POST", ["audit-management", "documents"]) => {
                let Some(id) = form_field(request, "audit_request") else {
                    return ResponseTemplate::new(400)
                        .set_body_json(json!({"audit_request": ["This field is required."]}));
                };
                let document_type = form_field(request, "document_type");
                self.attach(&caller, &id, document_type, None, request)
            }
            ("POST", ["audit-management", "requests", id, "remarks", "add"]) => {
                self.remark(&caller, id, request)
            }
            ("DELETE", ["audit-management", "documents", id, "delete"]) => {
                self.delete_document(&caller, id)
            }
            _ => not_found(),
        }
    }

    fn obtain_token(&mut self, request: &Request) -> ResponseTemplate {
        let body = json_body(request);
        let username = body["username"].as_str().unwrap_or_default();
        let password = body["password"].as_str().unwrap_or_default();

        let user_id = self
            .accounts
            .iter()
            .find(|account| account.username == username && account.password == password)
            .map(|account| account.id);

        match user_id {
            Some(user_id) => {
                let access = self.issue_access(user_id);
                let refresh = self.issue_refresh(user_id);
                ResponseTemplate::new(200).set_body_json(json!({
                    "access": access,
                    "refresh": refresh,
                }))
            }
            None => ResponseTemplate::new(401).set_body_json(json!({
                "detail": "No active account found with the given credentials"
            })),
        }
    }

    fn refresh_token(&mut self, request: &Request) -> ResponseTemplate {
        self.refresh_calls += 1;
        let delay = self.refresh_delay;
        let body = json_body(request);
        let refresh = body["refresh"].as_str().unwrap_or_default().to_string();

        let Some(user_id) = self.refresh_tokens.get(&refresh).copied() else {
            return ResponseTemplate::new(401)
                .set_body_json(json!({
                    "detail": "Token is invalid or expired",
                    "code": "token_not_valid"
                }))
                .set_delay(delay);
        };

        let access = self.issue_access(user_id);
        let mut answer = json!({ "access": access });
        if self.rotate_refresh_tokens {
            self.refresh_tokens.remove(&refresh);
            answer["refresh"] = json!(self.issue_refresh(user_id));
        }

        ResponseTemplate::new(200)
            .set_body_json(answer)
            .set_delay(delay)
    }

    fn register(&mut self, request: &Request) -> ResponseTemplate {
        let body = json_body(request);
        let username = body["username"].as_str().unwrap_or_default().to_string();
        let email = body["email"].as_str().unwrap_or_default().to_string();
        let password = body["password"].as_str().unwrap_or_default().to_string();
        let role = body["role"].as_str().unwrap_or_default().to_string();

        let mut errors = serde_json::Map::new();
        if self.accounts.iter().any(|account| account.username == username) {
            errors.insert(
                "username".to_string(),
                json!(["A user with that username already exists."]),
            );
        }
        if password.len() < 8 {
            errors.insert(
                "password".to_string(),
                json!(["This password is too short. It must contain at least 8 characters."]),
            );
        }
        if !errors.is_empty() {
            return ResponseTemplate::new(400).set_body_json(Value::Object(errors));
        }

        let organization = body["organization"].as_str().map(str::to_string);
        let id = self.create_account(&username, &password, &email, &role, organization);
        let created = self.account(id).map(Account::identity).unwrap_or(Value::Null);
        ResponseTemplate::new(201).set_body_json(created)
    }

    fn record(&mut self, id: &str) -> Option<&mut AuditRecord> {
        let id: i64 = id.parse().ok()?;
        self.requests.iter_mut().find(|record| record.id == id)
    }

    fn list(&self, caller: &Account) -> ResponseTemplate {
        let visible: Vec<Value> = self
            .requests
            .iter()
            .filter(|record| caller.role != "CSP" || record.csp_id == caller.id)
            .map(AuditRecord::to_json)
            .collect();
        ResponseTemplate::new(200).set_body_json(visible)
    }

    fn detail(&mut self, id: &str) -> ResponseTemplate {
        match self.record(id) {
            Some(record) => ResponseTemplate::new(200).set_body_json(record.to_json()),
            None => not_found(),
        }
    }

    fn create(&mut self, caller: &Account, request: &Request) -> ResponseTemplate {
        if caller.role != "CSP" {
            return forbidden();
        }

        let body = json_body(request);
        let id = self.next_id;
        self.next_id += 1;
        let record = AuditRecord {
            id,
            csp: caller.summary(),
            csp_id: caller.id,
            service_provider_name: body["service_provider_name"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            data_center_location: body["data_center_location"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            status: "Submitted_by_CSP".to_string(),
            certificate: None,
            request_date: now(),
            last_updated: now(),
            documents: Vec::new(),
            remarks: Vec::new(),
        };
        let created = record.to_json();
        self.requests.push(record);
        ResponseTemplate::new(201).set_body_json(created)
    }

    fn update_status(&mut self, caller: &Account, id: &str, request: &Request) -> ResponseTemplate {
        let (proposed, certificate) = if is_multipart(request) {
            (
                form_field(request, "status").unwrap_or_default(),
                has_form_file(request, "certificate_of_empanelment"),
            )
        } else {
            (
                json_body(request)["status"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                false,
            )
        };

        let Some(record) = self.record(id) else {
            return not_found();
        };

        if !next_status(&caller.role, &record.status, &proposed) {
            return ResponseTemplate::new(400).set_body_json(json!({
                "status": [format!("Cannot move from {} to {}.", record.status, proposed)]
            }));
        }
        if proposed == "Approved_by_ScientistF" && !certificate {
            return ResponseTemplate::new(400).set_body_json(json!({
                "certificate_of_empanelment": ["A certificate is required to approve."]
            }));
        }

        record.status = proposed;
        record.last_updated = now();
        if certificate {
            record.certificate = Some(format!("/media/certificates/request-{}.pdf", record.id));
        }
        ResponseTemplate::new(200).set_body_json(record.to_json())
    }

    fn attach(
        &mut self,
        caller: &Account,
        id: &str,
        document_type: Option<String>,
        description: Option<String>,
        request: &Request,
    ) -> ResponseTemplate {
        if !has_form_file(request, "file") {
            return ResponseTemplate::new(400)
                .set_body_json(json!({"file": ["No file was submitted."]}));
        }
        let Some(document_type) = document_type else {
            return ResponseTemplate::new(400)
                .set_body_json(json!({"document_type": ["This field is required."]}));
        };

        let document_id = self.next_id;
        self.next_id += 1;
        let uploader = caller.summary();
        let Some(record) = self.record(id) else {
            return not_found();
        };

        let allowed = match caller.role.as_str() {
            "CSP" => record.csp_id == caller.id,
            "STQC_Auditor" => record.status == "Forwarded_to_STQC",
            _ => false,
        };
        if !allowed {
            return forbidden();
        }

        let document = json!({
            "id": document_id,
            "document_type": document_type,
            "description": description,
            "uploaded_by": uploader,
            "upload_date": now(),
            "file_url": format!("/media/documents/{}.bin", document_id),
        });
        record.documents.push(document.clone());
        ResponseTemplate::new(201).set_body_json(document)
    }

    fn remark(&mut self, caller: &Account, id: &str, request: &Request) -> ResponseTemplate {
        if caller.role == "CSP" {
            return forbidden();
        }
        let comment = json_body(request)["comment"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();
        if comment.is_empty() {
            return ResponseTemplate::new(400)
                .set_body_json(json!({"comment": ["This field may not be blank."]}));
        }

        let remark_id = self.next_id;
        self.next_id += 1;
        let author = caller.summary();
        let Some(record) = self.record(id) else {
            return not_found();
        };

        let remark = json!({
            "id": remark_id,
            "comment": comment,
            "author": author,
            "timestamp": now(),
        });
        record.remarks.push(remark.clone());
        ResponseTemplate::new(201).set_body_json(remark)
    }

    fn delete_document(&mut self, caller: &Account, id: &str) -> ResponseTemplate {
        let Ok(document_id) = id.parse::<i64>() else {
            return not_found();
        };

        for record in &mut self.requests {
            let position = record
                .documents
                .iter()
                .position(|document| document["id"].as_i64() == Some(document_id));
            if let Some(position) = position {
                if record.documents[position]["uploaded_by"]["id"].as_i64() != Some(caller.id) {
                    return forbidden();
                }
                record.documents.remove(position);
                return ResponseTemplate::new(204);
            }
        }
        not_found()
    }
}
