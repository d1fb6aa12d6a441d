//! Domain types and pure rules for the fleetwatch notification service.
//!
//! This crate has no internal dependencies and performs no I/O, so the
//! catalog, expiry and dedup rules can be shared by the repository layer,
//! the event services and the HTTP API alike.

pub mod catalog;
pub mod channels;
pub mod dedup;
pub mod error;
pub mod expiry;
pub mod roles;
pub mod types;
