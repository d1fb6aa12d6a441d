//! Well-known role name constants.
//!
//! These must match the `users.role` values written by the account
//! management screens.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_EMPLOYEE: &str = "employee";

/// Roles that receive a `request_created` alert for every new request.
pub const REQUEST_REVIEWER_ROLES: [&str; 2] = [ROLE_MANAGER, ROLE_ADMIN];

/// Whether the role may trigger fleet-wide operations such as a manual
/// expiry scan.
pub fn is_staff(role: &str) -> bool {
    REQUEST_REVIEWER_ROLES.contains(&role)
}
