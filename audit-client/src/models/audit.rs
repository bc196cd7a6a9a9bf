use super::user::UserSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

/// Progress of an empanelment request. Variants are declared in workflow
/// order, so `Ord` compares by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuditStatus {
    #[serde(rename = "Submitted_by_CSP")]
    SubmittedByCsp,
    #[serde(rename = "Forwarded_to_STQC")]
    ForwardedToStqc,
    #[serde(rename = "Audit_Completed_by_STQC")]
    AuditCompletedByStqc,
    #[serde(rename = "Approved_by_ScientistF")]
    ApprovedByScientistF,
    #[serde(rename = "Rejected_by_ScientistF")]
    RejectedByScientistF,
}

impl AuditStatus {
    pub const ALL: [AuditStatus; 5] = [
        AuditStatus::SubmittedByCsp,
        AuditStatus::ForwardedToStqc,
        AuditStatus::AuditCompletedByStqc,
        AuditStatus::ApprovedByScientistF,
        AuditStatus::RejectedByScientistF,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::SubmittedByCsp => "Submitted_by_CSP",
            AuditStatus::ForwardedToStqc => "Forwarded_to_STQC",
            AuditStatus::AuditCompletedByStqc => "Audit_Completed_by_STQC",
            AuditStatus::ApprovedByScientistF => "Approved_by_ScientistF",
            AuditStatus::RejectedByScientistF => "Rejected_by_ScientistF",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuditStatus::SubmittedByCsp => "Submitted by CSP",
            AuditStatus::ForwardedToStqc => "Forwarded to STQC for Audit",
            AuditStatus::AuditCompletedByStqc => "Audit Completed by STQC",
            AuditStatus::ApprovedByScientistF => "Approved by Scientist F",
            AuditStatus::RejectedByScientistF => "Rejected by Scientist F",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuditStatus::ApprovedByScientistF | AuditStatus::RejectedByScientistF
        )
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRequest {
    pub id: i64,
    pub csp: UserSummary,
    pub service_provider_name: String,
    pub data_center_location: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: AuditStatus,
    #[serde(default)]
    pub status_display: Option<String>,
    #[serde(default)]
    pub certificate_of_empanelment: Option<String>,
    pub request_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub remarks: Vec<Remark>,
}

impl AuditRequest {
    pub fn csp_id(&self) -> i64 {
        self.csp.id
    }

    /// A certificate may only exist on an approved request.
    pub fn has_consistent_certificate(&self) -> bool {
        self.certificate_of_empanelment.is_none()
            || self.status == AuditStatus::ApprovedByScientistF
    }

    pub fn status_label(&self) -> &str {
        self.status_display
            .as_deref()
            .unwrap_or_else(|| self.status.label())
    }
}

/// Payload for `POST audit-management/requests/`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewAuditRequest {
    #[validate(custom(function = "not_blank", message = "Service provider name is required"))]
    pub service_provider_name: String,
    #[validate(custom(function = "not_blank", message = "Data center location is required"))]
    pub data_center_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub status: AuditStatus,
}

impl NewAuditRequest {
    pub fn new(service_provider_name: &str, data_center_location: &str) -> Self {
        Self {
            service_provider_name: service_provider_name.trim().to_string(),
            data_center_location: data_center_location.trim().to_string(),
            remarks: None,
            status: AuditStatus::SubmittedByCsp,
        }
    }

    pub fn with_remarks(mut self, remarks: &str) -> Self {
        let remarks = remarks.trim();
        self.remarks = (!remarks.is_empty()).then(|| remarks.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub document_type: String,
    #[serde(default)]
    pub description: Option<String>,
    pub uploaded_by: UserSummary,
    pub upload_date: DateTime<Utc>,
    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remark {
    pub id: i64,
    pub comment: String,
    pub author: UserSummary,
    pub timestamp: DateTime<Utc>,
}

/// Payload for `remarks/add/`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewRemark {
    #[validate(custom(function = "not_blank", message = "Remark cannot be empty"))]
    pub comment: String,
}

impl NewRemark {
    pub fn new(comment: &str) -> Self {
        Self {
            comment: comment.trim().to_string(),
        }
    }
}

/// A file carried in a multipart body.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub const DEFAULT_MIME_TYPE: &'static str = "application/octet-stream";

    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            mime_type: Self::DEFAULT_MIME_TYPE.to_string(),
            bytes,
        }
    }

    pub fn pdf(file_name: &str, bytes: Vec<u8>) -> Self {
        Self::new(file_name, bytes).with_mime_type("application/pdf")
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = mime_type.to_string();
        self
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Payload for `documents/upload/`.
#[derive(Debug, Clone, Validate)]
pub struct DocumentUpload {
    #[validate(custom(function = "not_blank", message = "Document type is required"))]
    pub document_type: String,
    pub description: Option<String>,
    pub file: Attachment,
}

impl DocumentUpload {
    pub fn new(document_type: &str, file: Attachment) -> Self {
        Self {
            document_type: document_type.trim().to_string(),
            description: None,
            file,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Groups of documents a CSP attaches when submitting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentCategory {
    Prequalification,
    Technical,
    Compliances,
    Standard,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 4] = [
        DocumentCategory::Prequalification,
        DocumentCategory::Technical,
        DocumentCategory::Compliances,
        DocumentCategory::Standard,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DocumentCategory::Prequalification => "Prequalification",
            DocumentCategory::Technical => "Technical",
            DocumentCategory::Compliances => "Compliances",
            DocumentCategory::Standard => "Standard",
        }
    }

    /// Number of document slots a submission form opens with. Slots can be
    /// added or removed, so this is not enforced.
    pub fn expected_documents(&self) -> usize {
        match self {
            DocumentCategory::Prequalification => 7,
            DocumentCategory::Technical => 7,
            DocumentCategory::Compliances => 9,
            DocumentCategory::Standard => 8,
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named file sent with a new request. The name becomes the document's
/// `document_type`.
#[derive(Debug, Clone, Validate)]
pub struct SubmissionDocument {
    pub category: DocumentCategory,
    #[validate(custom(function = "not_blank", message = "Every document needs a name"))]
    pub name: String,
    #[validate(custom(function = "has_content", message = "Every document needs a file"))]
    pub file: Attachment,
}

impl SubmissionDocument {
    /// Submission files are always sent as PDF.
    pub fn new(category: DocumentCategory, name: &str, file: Attachment) -> Self {
        Self {
            category,
            name: name.trim().to_string(),
            file: file.with_mime_type("application/pdf"),
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn has_content(file: &Attachment) -> Result<(), ValidationError> {
    if file.bytes.is_empty() {
        return Err(ValidationError::new("empty_file"));
    }
    Ok(())
}
