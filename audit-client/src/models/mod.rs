pub mod audit;
pub mod user;

pub use audit::{
    Attachment, AuditRequest, AuditStatus, Document, DocumentCategory, DocumentUpload,
    NewAuditRequest, NewRemark, Remark, SubmissionDocument,
};
pub use user::{Identity, Registration, Role, UserSummary};
