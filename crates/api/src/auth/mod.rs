//! Authentication primitives.
//!
//! Users sign in through the CRUD subsystem; this service only verifies the
//! HS256 access tokens it issues.

pub mod jwt;
