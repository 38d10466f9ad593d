//! Data models shared across database access and API handlers.

pub mod audit_log;
pub mod role;
pub mod session;
pub mod user;
