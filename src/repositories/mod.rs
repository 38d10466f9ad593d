pub mod audit_log;
pub mod role;
pub mod session;
pub mod user;

pub use audit_log::*;
pub use role::*;
pub use session::*;
pub use user::*;
