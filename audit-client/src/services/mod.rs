pub mod audit_client;
pub mod identity_client;
