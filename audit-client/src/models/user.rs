use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Roles known to the empanelment workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "CSP")]
    Csp,
    #[serde(rename = "MeitY_Reviewer")]
    MeityReviewer,
    #[serde(rename = "STQC_Auditor")]
    StqcAuditor,
    #[serde(rename = "Scientist_F")]
    ScientistF,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Csp,
        Role::MeityReviewer,
        Role::StqcAuditor,
        Role::ScientistF,
    ];

    /// Wire value used by the identity provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Csp => "CSP",
            Role::MeityReviewer => "MeitY_Reviewer",
            Role::StqcAuditor => "STQC_Auditor",
            Role::ScientistF => "Scientist_F",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Csp => "Cloud Service Provider",
            Role::MeityReviewer => "MeitY Reviewer",
            Role::StqcAuditor => "STQC Auditor",
            Role::ScientistF => "Scientist F",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated user, as returned by `users/me/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub organization: Option<String>,
}

/// Compact user reference embedded in requests, documents and remarks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub organization: Option<String>,
}

/// Account creation payload for `users/register/`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}
