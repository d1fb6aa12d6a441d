//! Dedup key derivation.
//!
//! The key is stored next to the alert and covered by a unique constraint on
//! `(recipient_id, dedup_key)`, so two alerts with the same key for the same
//! recipient can never coexist. Kinds that may legitimately repeat return no
//! key at all.

use crate::catalog::{field_text, EventKind};
use crate::error::CoreError;
use crate::types::{EventData, Timestamp};

/// Default width of a dedup time bucket: 24 hours.
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Index of the fixed-width time bucket containing `at`.
pub fn bucket(at: Timestamp, window_secs: i64) -> i64 {
    at.timestamp().div_euclid(window_secs.max(1))
}

/// Derive the dedup key for an event raised at `at`.
///
/// Expiry kinds require `vehicle_id` and `expiry_type`; the kind is part of
/// the key so a warning turning into an expiry inside one bucket still raises
/// a second alert.
pub fn dedup_key(
    kind: EventKind,
    data: &EventData,
    at: Timestamp,
    window_secs: i64,
) -> Result<Option<String>, CoreError> {
    let key = match kind {
        EventKind::VehicleExpiryWarning | EventKind::VehicleExpired => {
            let vehicle_id = required(data, kind, "vehicle_id")?;
            let expiry_type = required(data, kind, "expiry_type")?;
            Some(format!(
                "{kind}:{vehicle_id}:{expiry_type}:{}",
                bucket(at, window_secs)
            ))
        }
        EventKind::RequestCreated | EventKind::RequestApproved | EventKind::RequestRejected => {
            field_text(data, "request_id").map(|id| format!("{kind}:{id}"))
        }
        EventKind::VehicleAssigned => field_text(data, "vehicle_id")
            .map(|id| format!("{kind}:{id}:{}", bucket(at, window_secs))),
        EventKind::UserCreated => Some(kind.as_str().to_string()),
        EventKind::UserRoleChanged => None,
    };
    Ok(key)
}

fn required(data: &EventData, kind: EventKind, field: &str) -> Result<String, CoreError> {
    field_text(data, field)
        .ok_or_else(|| CoreError::Validation(format!("{kind} requires a `{field}` field")))
}
