//! Outbound delivery beyond the live feed.

pub mod email;
pub mod provider;
pub mod templates;
