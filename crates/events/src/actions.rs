//! Notifications triggered by actions in the CRUD screens.
//!
//! The domain action (approving a request, assigning a vehicle, ...) has
//! already been committed when these run, so none of them fail: each
//! returns a [`DispatchSummary`] and logs what went wrong. On success the
//! acting user gets a confirmation toast.

use std::sync::Arc;

use fleetwatch_core::catalog::EventKind;
use fleetwatch_core::roles::REQUEST_REVIEWER_ROLES;
use fleetwatch_core::types::{DbId, EventData};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::NotifyError;
use crate::local_alert::{Toast, ToastBus, ToastLevel};
use crate::notifier::{Notifier, NotifyOutcome};
use crate::store::Directory;

/// Fallback location label for requests without one.
const UNSPECIFIED_LOCATION: &str = "Unspecified";

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRequest {
    pub id: String,
    pub requested_by: DbId,
    pub resource_type: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDecision {
    Approved,
    Rejected,
}

impl RequestDecision {
    fn event_kind(self) -> EventKind {
        match self {
            RequestDecision::Approved => EventKind::RequestApproved,
            RequestDecision::Rejected => EventKind::RequestRejected,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleRef {
    pub id: DbId,
    pub license_plate: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// A committed domain action that should notify someone.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    RequestCreated {
        request: ResourceRequest,
    },
    RequestStatusChanged {
        request: ResourceRequest,
        decision: RequestDecision,
    },
    VehicleAssigned {
        vehicle: VehicleRef,
        assignee_id: DbId,
    },
    UserRoleChanged {
        user_id: DbId,
        old_role: String,
        new_role: String,
    },
    UserCreated {
        user_id: DbId,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub created: usize,
    pub deduplicated: usize,
    pub failed: usize,
}

impl DispatchSummary {
    fn record(
        &mut self,
        kind: EventKind,
        recipient_id: DbId,
        result: Result<NotifyOutcome, NotifyError>,
    ) {
        match result {
            Ok(NotifyOutcome::Created(_)) => self.created += 1,
            Ok(NotifyOutcome::Deduplicated) => self.deduplicated += 1,
            Ok(NotifyOutcome::Ignored) => {}
            Err(e) => {
                self.failed += 1;
                tracing::warn!(recipient_id, kind = %kind, error = %e, "Domain notification failed");
            }
        }
    }
}

pub struct DomainNotifications {
    notifier: Arc<Notifier>,
    directory: Arc<dyn Directory>,
    toasts: Arc<ToastBus>,
}

impl DomainNotifications {
    pub fn new(notifier: Arc<Notifier>, directory: Arc<dyn Directory>, toasts: Arc<ToastBus>) -> Self {
        Self {
            notifier,
            directory,
            toasts,
        }
    }

    /// Dispatch a domain event on behalf of `actor_id`.
    pub async fn handle(&self, actor_id: DbId, event: DomainEvent) -> DispatchSummary {
        match event {
            DomainEvent::RequestCreated { request } => self.request_created(&request).await,
            DomainEvent::RequestStatusChanged { request, decision } => {
                self.request_status_changed(actor_id, &request, decision).await
            }
            DomainEvent::VehicleAssigned {
                vehicle,
                assignee_id,
            } => self.vehicle_assigned(actor_id, &vehicle, assignee_id).await,
            DomainEvent::UserRoleChanged {
                user_id,
                old_role,
                new_role,
            } => self.user_role_changed(user_id, &old_role, &new_role).await,
            DomainEvent::UserCreated { user_id } => self.user_created(user_id).await,
        }
    }

    /// Notify every active manager and admin of a new request.
    pub async fn request_created(&self, request: &ResourceRequest) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let reviewers = match self.directory.active_ids_by_roles(&REQUEST_REVIEWER_ROLES).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(request_id = %request.id, error = %e, "Could not load request reviewers");
                summary.failed += 1;
                return summary;
            }
        };

        let kind = EventKind::RequestCreated;
        for reviewer in reviewers {
            let data = event_data(json!({
                "request_id": request.id,
                "resource_type": request.resource_type,
                "location": request.location.as_deref().unwrap_or(UNSPECIFIED_LOCATION),
                "urgency": request.urgency,
            }));
            summary.record(kind, reviewer, self.notifier.notify(kind, reviewer, data).await);
        }
        summary
    }

    /// Tell the requester their request was approved or rejected.
    pub async fn request_status_changed(
        &self,
        actor_id: DbId,
        request: &ResourceRequest,
        decision: RequestDecision,
    ) -> DispatchSummary {
        let kind = decision.event_kind();
        let data = event_data(json!({
            "request_id": request.id,
            "resource_type": request.resource_type,
            "location": request.location,
        }));
        let mut summary = DispatchSummary::default();
        summary.record(
            kind,
            request.requested_by,
            self.notifier.notify(kind, request.requested_by, data).await,
        );
        let verdict = match decision {
            RequestDecision::Approved => "approval",
            RequestDecision::Rejected => "rejection",
        };
        self.confirm(actor_id, &summary, &format!("The requester was notified of the {verdict}"));
        summary
    }

    pub async fn vehicle_assigned(
        &self,
        actor_id: DbId,
        vehicle: &VehicleRef,
        assignee_id: DbId,
    ) -> DispatchSummary {
        let kind = EventKind::VehicleAssigned;
        let data = event_data(json!({
            "vehicle_id": vehicle.id,
            "license_plate": vehicle.license_plate,
            "brand": vehicle.brand,
            "model": vehicle.model,
        }));
        let mut summary = DispatchSummary::default();
        summary.record(kind, assignee_id, self.notifier.notify(kind, assignee_id, data).await);
        self.confirm(actor_id, &summary, "The user was notified of the vehicle assignment");
        summary
    }

    pub async fn user_role_changed(&self, user_id: DbId, old_role: &str, new_role: &str) -> DispatchSummary {
        let kind = EventKind::UserRoleChanged;
        let data = event_data(json!({ "old_role": old_role, "new_role": new_role }));
        let mut summary = DispatchSummary::default();
        summary.record(kind, user_id, self.notifier.notify(kind, user_id, data).await);
        summary
    }

    pub async fn user_created(&self, user_id: DbId) -> DispatchSummary {
        let kind = EventKind::UserCreated;
        let mut summary = DispatchSummary::default();
        summary.record(kind, user_id, self.notifier.notify(kind, user_id, EventData::new()).await);
        summary
    }

    fn confirm(&self, actor_id: DbId, summary: &DispatchSummary, message: &str) {
        if summary.created > 0 {
            self.toasts.publish(
                Toast::new(actor_id, ToastLevel::Success, "Notification sent").with_message(message),
            );
        }
    }
}

fn event_data(value: serde_json::Value) -> EventData {
    match value {
        serde_json::Value::Object(map) => map,
        _ => EventData::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwatch_db::models::user::UserContact;

    use crate::hub::AlertHub;
    use crate::memory::MemoryBackend;
    use crate::notifier::NotifierConfig;

    fn user(id: DbId, role: &str) -> UserContact {
        UserContact {
            id,
            email: format!("u{id}@example.com"),
            full_name: None,
            role: role.into(),
        }
    }

    fn setup() -> (Arc<MemoryBackend>, Arc<ToastBus>, DomainNotifications) {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_recipients([5]);
        let toasts = Arc::new(ToastBus::default());
        let notifier = Arc::new(Notifier::new(
            backend.clone(),
            Arc::new(AlertHub::default()),
            NotifierConfig::default(),
        ));
        let actions = DomainNotifications::new(notifier, backend.clone(), toasts.clone());
        (backend, toasts, actions)
    }

    fn request() -> ResourceRequest {
        ResourceRequest {
            id: "r-17".into(),
            requested_by: 5,
            resource_type: "laptop".into(),
            location: None,
            urgency: Some("high".into()),
        }
    }

    #[tokio::test]
    async fn new_request_reaches_active_reviewers_only() {
        let (backend, _, actions) = setup();
        backend.add_user(user(1, "admin"));
        backend.add_user(user(2, "manager"));
        backend.add_user(user(3, "employee"));
        backend.add_user(user(4, "manager"));
        backend.deactivate_user(4);

        let summary = actions.request_created(&request()).await;
        assert_eq!(summary.created, 2);

        let mut recipients: Vec<DbId> = backend.alerts().iter().map(|a| a.recipient_id).collect();
        recipients.sort_unstable();
        assert_eq!(recipients, vec![1, 2]);
        assert!(backend.alerts()[0].message.contains("Unspecified"));
    }

    #[tokio::test]
    async fn decision_notifies_requester_and_toasts_actor() {
        let (backend, toasts, actions) = setup();
        let mut rx = toasts.subscribe();

        let summary = actions
            .request_status_changed(9, &request(), RequestDecision::Rejected)
            .await;
        assert_eq!(summary.created, 1);

        let alert = &backend.alerts()[0];
        assert_eq!(alert.recipient_id, 5);
        assert_eq!(alert.kind, "request_rejected");
        assert_eq!(alert.message, "Your laptop request has been rejected");

        let toast = rx.recv().await.unwrap();
        assert_eq!(toast.recipient_id, 9);
        assert_eq!(toast.level, ToastLevel::Success);
    }

    #[tokio::test]
    async fn duplicate_decision_sends_no_toast() {
        let (_, toasts, actions) = setup();
        actions
            .request_status_changed(9, &request(), RequestDecision::Approved)
            .await;
        let mut rx = toasts.subscribe();
        let summary = actions
            .request_status_changed(9, &request(), RequestDecision::Approved)
            .await;
        assert_eq!(summary.deduplicated, 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn store_outage_is_summarised_not_raised() {
        let (backend, _, actions) = setup();
        backend.set_unavailable(true);
        let summary = actions.user_role_changed(5, "employee", "manager").await;
        assert_eq!(summary.failed, 1);
        let summary = actions.request_created(&request()).await;
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn domain_event_is_tagged_by_name() {
        let event: DomainEvent = serde_json::from_value(serde_json::json!({
            "event": "vehicle_assigned",
            "vehicle": {"id": 3, "license_plate": "AB123CD"},
            "assignee_id": 7,
        }))
        .unwrap();
        assert!(matches!(event, DomainEvent::VehicleAssigned { assignee_id: 7, .. }));
    }
}
