pub mod audit_log;
pub mod auth;
pub mod permission;
pub mod session_store;
pub mod token_issuer;
