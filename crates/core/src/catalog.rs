//! Event catalog: the closed set of event kinds and their templates.
//!
//! [`render`] is a pure function over [`EventKind`]. Placeholders of the form
//! `{field}` are replaced literally with the matching value from the event
//! data; a placeholder with no matching field is left in the output verbatim.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channels::ChannelSet;
use crate::error::CoreError;
use crate::types::EventData;

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// A domain event that can raise an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RequestCreated,
    RequestApproved,
    RequestRejected,
    VehicleExpiryWarning,
    VehicleExpired,
    VehicleAssigned,
    UserCreated,
    UserRoleChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::RequestCreated,
        EventKind::RequestApproved,
        EventKind::RequestRejected,
        EventKind::VehicleExpiryWarning,
        EventKind::VehicleExpired,
        EventKind::VehicleAssigned,
        EventKind::UserCreated,
        EventKind::UserRoleChanged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::RequestCreated => "request_created",
            EventKind::RequestApproved => "request_approved",
            EventKind::RequestRejected => "request_rejected",
            EventKind::VehicleExpiryWarning => "vehicle_expiry_warning",
            EventKind::VehicleExpired => "vehicle_expired",
            EventKind::VehicleAssigned => "vehicle_assigned",
            EventKind::UserCreated => "user_created",
            EventKind::UserRoleChanged => "user_role_changed",
        }
    }

    /// Title and message templates.
    pub fn template(self) -> Template {
        let (title, message) = match self {
            EventKind::RequestCreated => (
                "New resource request",
                "A new {resource_type} request was created by {location}",
            ),
            EventKind::RequestApproved => (
                "Request approved",
                "Your {resource_type} request has been approved",
            ),
            EventKind::RequestRejected => (
                "Request rejected",
                "Your {resource_type} request has been rejected",
            ),
            EventKind::VehicleExpiryWarning => (
                "Upcoming deadline",
                "Vehicle {license_plate}: {expiry_type} deadline in {days} days",
            ),
            EventKind::VehicleExpired => (
                "Deadline passed",
                "Vehicle {license_plate}: {expiry_type} deadline has passed",
            ),
            EventKind::VehicleAssigned => (
                "Vehicle assigned",
                "Vehicle {license_plate} ({brand} {model}) has been assigned to you",
            ),
            EventKind::UserCreated => (
                "Welcome to the portal",
                "Your account has been created successfully",
            ),
            EventKind::UserRoleChanged => ("Role changed", "Your role has been changed to {new_role}"),
        };
        Template { title, message }
    }

    pub fn priority(self) -> Priority {
        match self {
            EventKind::RequestCreated
            | EventKind::VehicleExpiryWarning
            | EventKind::VehicleExpired => Priority::High,
            EventKind::RequestApproved
            | EventKind::RequestRejected
            | EventKind::VehicleAssigned => Priority::Medium,
            EventKind::UserCreated | EventKind::UserRoleChanged => Priority::Low,
        }
    }

    /// Presentation category shown by the client (icon and colour).
    pub fn category(self) -> AlertCategory {
        match self {
            EventKind::RequestCreated => AlertCategory::Request,
            EventKind::RequestApproved => AlertCategory::Approval,
            EventKind::RequestRejected => AlertCategory::Rejection,
            EventKind::VehicleExpiryWarning | EventKind::VehicleExpired => AlertCategory::Warning,
            EventKind::VehicleAssigned => AlertCategory::Vehicle,
            EventKind::UserCreated => AlertCategory::System,
            EventKind::UserRoleChanged => AlertCategory::Info,
        }
    }

    /// Whether this kind is on the email allow-list.
    pub fn sends_email(self) -> bool {
        matches!(
            self,
            EventKind::RequestApproved
                | EventKind::RequestRejected
                | EventKind::VehicleExpired
                | EventKind::UserCreated
        )
    }

    pub fn channels(self) -> ChannelSet {
        if self.sends_email() {
            ChannelSet::realtime().with_email()
        } else {
            ChannelSet::realtime()
        }
    }

    pub fn email_layout(self) -> EmailLayout {
        match self {
            EventKind::UserCreated => EmailLayout::Welcome,
            _ => EmailLayout::Notification,
        }
    }

    /// Deep link into the portal for the alert's subject, if any.
    pub fn action_url(self, data: &EventData) -> Option<String> {
        match self {
            EventKind::RequestCreated | EventKind::RequestApproved | EventKind::RequestRejected => {
                Some(match field_text(data, "request_id") {
                    Some(id) => format!("/resources?id={id}"),
                    None => "/resources".to_string(),
                })
            }
            EventKind::VehicleExpiryWarning
            | EventKind::VehicleExpired
            | EventKind::VehicleAssigned => Some(match field_text(data, "vehicle_id") {
                Some(id) => format!("/vehicles/{id}"),
                None => "/vehicles".to_string(),
            }),
            EventKind::UserCreated | EventKind::UserRoleChanged => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown event kind: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Supporting enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Request,
    Approval,
    Rejection,
    Vehicle,
    Warning,
    Info,
    System,
}

impl AlertCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertCategory::Request => "request",
            AlertCategory::Approval => "approval",
            AlertCategory::Rejection => "rejection",
            AlertCategory::Vehicle => "vehicle",
            AlertCategory::Warning => "warning",
            AlertCategory::Info => "info",
            AlertCategory::System => "system",
        }
    }
}

/// HTML layout family used by the email side-channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailLayout {
    Notification,
    Welcome,
}

impl EmailLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            EmailLayout::Notification => "notification",
            EmailLayout::Welcome => "welcome",
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub title: &'static str,
    pub message: &'static str,
}

/// Output of [`render`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rendered {
    pub title: String,
    pub message: String,
    pub channels: ChannelSet,
    pub priority: Priority,
    pub category: AlertCategory,
}

/// Render the templates for `kind` against `data`.
pub fn render(kind: EventKind, data: &EventData) -> Rendered {
    let template = kind.template();
    Rendered {
        title: substitute(template.title, data),
        message: substitute(template.message, data),
        channels: kind.channels(),
        priority: kind.priority(),
        category: kind.category(),
    }
}

/// Replace every `{key}` token with the text of `data[key]`.
pub fn substitute(template: &str, data: &EventData) -> String {
    let mut out = template.to_string();
    for (key, value) in data {
        let token = format!("{{{key}}}");
        if out.contains(&token) {
            out = out.replace(&token, &value_text(value));
        }
    }
    out
}

/// Text of a data field as it appears in templates and keys.
///
/// Strings are used verbatim, other scalars via their JSON text. `null`
/// counts as absent.
pub fn field_text(data: &EventData, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::Null => None,
        v => Some(value_text(v)),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn data(value: Value) -> EventData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn vehicle_assigned_message_contains_plate() {
        let rendered = render(
            EventKind::VehicleAssigned,
            &data(json!({"license_plate": "AB123CD", "brand": "Fiat", "model": "Panda"})),
        );
        assert!(rendered.message.contains("AB123CD"));
        assert_eq!(
            rendered.message,
            "Vehicle AB123CD (Fiat Panda) has been assigned to you"
        );
    }

    #[test]
    fn missing_field_leaves_token_verbatim() {
        let rendered = render(
            EventKind::VehicleAssigned,
            &data(json!({"brand": "Fiat", "model": "Panda"})),
        );
        assert!(rendered.message.contains("{license_plate}"));
    }

    #[test]
    fn numeric_fields_render_without_quotes() {
        let rendered = render(
            EventKind::VehicleExpiryWarning,
            &data(json!({"license_plate": "XY", "expiry_type": "insurance", "days": 3})),
        );
        assert_eq!(
            rendered.message,
            "Vehicle XY: insurance deadline in 3 days"
        );
    }

    #[test]
    fn repeated_tokens_are_all_replaced() {
        let out = substitute("{a}-{a}", &data(json!({"a": "x"})));
        assert_eq!(out, "x-x");
    }

    #[test]
    fn kind_round_trips_through_name() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_name_is_validation_error() {
        assert_matches!(
            "vehicle_exploded".parse::<EventKind>(),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn email_allow_list() {
        let emailed: Vec<_> = EventKind::ALL.into_iter().filter(|k| k.sends_email()).collect();
        assert_eq!(
            emailed,
            vec![
                EventKind::RequestApproved,
                EventKind::RequestRejected,
                EventKind::VehicleExpired,
                EventKind::UserCreated,
            ]
        );
    }

    #[test]
    fn action_urls_follow_subject() {
        let d = data(json!({"request_id": 12}));
        assert_eq!(
            EventKind::RequestApproved.action_url(&d).as_deref(),
            Some("/resources?id=12")
        );
        assert_eq!(
            EventKind::VehicleExpired.action_url(&EventData::new()).as_deref(),
            Some("/vehicles")
        );
        assert_eq!(EventKind::UserRoleChanged.action_url(&d), None);
    }

    #[test]
    fn welcome_layout_only_for_account_creation() {
        assert_eq!(EventKind::UserCreated.email_layout(), EmailLayout::Welcome);
        assert_eq!(
            EventKind::VehicleExpired.email_layout(),
            EmailLayout::Notification
        );
    }
}
