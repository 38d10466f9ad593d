//! Reusable validation rules applied to API request payloads.

pub mod rules;

pub use validator::Validate;
