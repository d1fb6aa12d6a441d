//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- the authenticated user, from a Bearer token or a
//!   `token` query parameter.
//! - [`rbac::RequireAdmin`] -- requires the `admin` role.
//! - [`rbac::RequireStaff`] -- requires `manager` or `admin`.

pub mod auth;
pub mod rbac;
