//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod alert_repo;
pub mod email_log_repo;
pub mod user_repo;
pub mod vehicle_repo;

pub use alert_repo::AlertRepo;
pub use email_log_repo::EmailLogRepo;
pub use user_repo::UserRepo;
pub use vehicle_repo::VehicleRepo;
