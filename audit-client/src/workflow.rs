//! Role-gated status transitions for audit requests.
//!
//! Everything here is pure: collaborators query [`available_actions`] before
//! rendering an action, and the audit client runs [`validate_transition`]
//! before a status update reaches the network.

use crate::models::{Attachment, AuditRequest, AuditStatus, Document, Identity, Role};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("{role} cannot move a request from {from} to {to}")]
    IllegalTransition {
        role: Role,
        from: AuditStatus,
        to: AuditStatus,
    },

    #[error("Approving a request requires a certificate of empanelment")]
    MissingCertificate,

    #[error("{role} is not allowed to {action}")]
    Forbidden { role: Role, action: &'static str },

    #[error("{role} cannot upload documents of type {document_type}")]
    DocumentTypeNotAllowed { role: Role, document_type: String },
}

struct Rule {
    role: Role,
    from: AuditStatus,
    to: &'static [AuditStatus],
}

const RULES: [Rule; 3] = [
    Rule {
        role: Role::MeityReviewer,
        from: AuditStatus::SubmittedByCsp,
        to: &[AuditStatus::ForwardedToStqc],
    },
    Rule {
        role: Role::StqcAuditor,
        from: AuditStatus::ForwardedToStqc,
        to: &[AuditStatus::AuditCompletedByStqc],
    },
    Rule {
        role: Role::ScientistF,
        from: AuditStatus::AuditCompletedByStqc,
        to: &[
            AuditStatus::ApprovedByScientistF,
            AuditStatus::RejectedByScientistF,
        ],
    },
];

/// Next statuses `role` may move a request in `status` to. Empty when no
/// action is available.
pub fn available_actions(role: Role, status: AuditStatus) -> &'static [AuditStatus] {
    RULES
        .iter()
        .find(|rule| rule.role == role && rule.from == status)
        .map(|rule| rule.to)
        .unwrap_or(&[])
}

/// Label for the affordance that performs a move to `next`.
pub fn action_label(next: AuditStatus) -> &'static str {
    match next {
        AuditStatus::SubmittedByCsp => "Submit Request",
        AuditStatus::ForwardedToStqc => "Forward to STQC for Audit",
        AuditStatus::AuditCompletedByStqc => "Audit Completed by STQC",
        AuditStatus::ApprovedByScientistF => "Approve Audit",
        AuditStatus::RejectedByScientistF => "Reject Audit",
    }
}

pub fn requires_certificate(next: AuditStatus) -> bool {
    next == AuditStatus::ApprovedByScientistF
}

/// Check a proposed status change before it is sent.
pub fn validate_transition(
    role: Role,
    current: AuditStatus,
    proposed: AuditStatus,
    certificate: Option<&Attachment>,
) -> Result<(), WorkflowError> {
    if !available_actions(role, current).contains(&proposed) {
        return Err(WorkflowError::IllegalTransition {
            role,
            from: current,
            to: proposed,
        });
    }

    if requires_certificate(proposed) && certificate.is_none() {
        return Err(WorkflowError::MissingCertificate);
    }

    Ok(())
}

/// CSPs upload on their own requests; auditors only while the audit is open.
pub fn can_upload_document(identity: &Identity, request: &AuditRequest) -> bool {
    match identity.role {
        Role::Csp => identity.id == request.csp_id(),
        Role::StqcAuditor => request.status == AuditStatus::ForwardedToStqc,
        Role::MeityReviewer | Role::ScientistF => false,
    }
}

pub fn can_create_request(role: Role) -> bool {
    role == Role::Csp
}

pub fn can_add_remark(role: Role) -> bool {
    matches!(
        role,
        Role::MeityReviewer | Role::StqcAuditor | Role::ScientistF
    )
}

pub fn can_delete_document(identity: &Identity, document: &Document) -> bool {
    identity.id == document.uploaded_by.id
}

pub fn ensure_can_upload(identity: &Identity, request: &AuditRequest) -> Result<(), WorkflowError> {
    if can_upload_document(identity, request) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden {
            role: identity.role,
            action: "upload documents to this request",
        })
    }
}

pub fn ensure_can_create(role: Role) -> Result<(), WorkflowError> {
    if can_create_request(role) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden {
            role,
            action: "create audit requests",
        })
    }
}

pub fn ensure_can_remark(role: Role) -> Result<(), WorkflowError> {
    if can_add_remark(role) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden {
            role,
            action: "add remarks",
        })
    }
}

pub fn ensure_can_delete(identity: &Identity, document: &Document) -> Result<(), WorkflowError> {
    if can_delete_document(identity, document) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden {
            role: identity.role,
            action: "delete a document uploaded by someone else",
        })
    }
}

/// Document categories offered to `role` on upload.
pub fn upload_document_types(role: Role) -> &'static [&'static str] {
    match role {
        Role::Csp => &["CSP_Submission", "Other"],
        Role::StqcAuditor => &["Audit_Report", "Other"],
        Role::MeityReviewer | Role::ScientistF => &[],
    }
}

pub fn ensure_can_upload_type(role: Role, document_type: &str) -> Result<(), WorkflowError> {
    if upload_document_types(role).contains(&document_type) {
        Ok(())
    } else {
        Err(WorkflowError::DocumentTypeNotAllowed {
            role,
            document_type: document_type.to_string(),
        })
    }
}

/// Requests split the way a role's dashboard shows them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Worklist {
    pub pending: Vec<AuditRequest>,
    pub reviewed: Vec<AuditRequest>,
}

/// MeitY reviewers see freshly submitted requests as pending and everything
/// past submission as reviewed; other roles get the list unsplit.
pub fn worklist(role: Role, requests: Vec<AuditRequest>) -> Worklist {
    match role {
        Role::MeityReviewer => {
            let (pending, reviewed) = requests
                .into_iter()
                .partition(|request| request.status == AuditStatus::SubmittedByCsp);
            Worklist { pending, reviewed }
        }
        _ => Worklist {
            pending: requests,
            reviewed: Vec::new(),
        },
    }
}
