//! Row models and insert DTOs.

pub mod alert;
pub mod email_log;
pub mod user;
pub mod vehicle;
