//! In-process store backend.
//!
//! Every operation runs under one mutex, so the dedup check and the insert
//! are atomic in the same way the unique constraint makes them atomic in
//! PostgreSQL. Used by tests and by local runs without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use fleetwatch_core::types::{DbId, Timestamp};
use fleetwatch_db::models::alert::{Alert, AlertFilter, NewAlert};
use fleetwatch_db::models::email_log::NewEmailLog;
use fleetwatch_db::models::user::UserContact;
use fleetwatch_db::models::vehicle::Vehicle;

use crate::error::StoreError;
use crate::store::{AlertStore, Directory, EmailLedger, FleetRecords};

enum FleetRow {
    Ok(Vehicle),
    Malformed(String),
}

struct MemberRecord {
    contact: UserContact,
    active: bool,
}

#[derive(Default)]
struct State {
    alerts: BTreeMap<DbId, Alert>,
    next_alert_id: DbId,
    last_created_at: Option<Timestamp>,
    fleet: Vec<FleetRow>,
    members: HashMap<DbId, MemberRecord>,
    email_log: Vec<NewEmailLog>,
    unavailable: bool,
}

/// Memory-backed implementation of every store trait.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lock the state, failing the way an unreachable database would.
    fn available(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        let state = self.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable("memory backend offline".into()));
        }
        Ok(state)
    }

    /// Simulate the datastore going away (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn add_vehicle(&self, vehicle: Vehicle) {
        self.lock().fleet.push(FleetRow::Ok(vehicle));
    }

    /// Add a fleet record that fails to decode when read.
    pub fn add_malformed_vehicle(&self, reason: impl Into<String>) {
        self.lock().fleet.push(FleetRow::Malformed(reason.into()));
    }

    pub fn add_user(&self, contact: UserContact) {
        self.lock().members.insert(
            contact.id,
            MemberRecord {
                contact,
                active: true,
            },
        );
    }

    /// Register plain employees so alerts can be stored for them.
    pub fn add_recipients(&self, ids: impl IntoIterator<Item = DbId>) {
        for id in ids {
            self.add_user(UserContact {
                id,
                email: format!("user{id}@fleet.test"),
                full_name: None,
                role: "employee".into(),
            });
        }
    }

    pub fn deactivate_user(&self, user_id: DbId) {
        if let Some(member) = self.lock().members.get_mut(&user_id) {
            member.active = false;
        }
    }

    /// Every alert currently stored, in insertion order.
    pub fn alerts(&self) -> Vec<Alert> {
        self.lock().alerts.values().cloned().collect()
    }

    /// Every recorded email attempt, oldest first.
    pub fn email_log(&self) -> Vec<NewEmailLog> {
        self.lock().email_log.clone()
    }

    /// Shift an alert's creation time; lets retention tests age alerts.
    pub fn backdate(&self, alert_id: DbId, by: Duration) {
        if let Some(alert) = self.lock().alerts.get_mut(&alert_id) {
            alert.created_at -= by;
        }
    }
}

impl State {
    /// Creation timestamps never go backwards, matching insertion order.
    fn next_timestamp(&mut self) -> Timestamp {
        let now = Utc::now();
        let at = match self.last_created_at {
            Some(last) if last >= now => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(at);
        at
    }

    fn ownership_check(&self, recipient_id: DbId, alert_id: DbId) -> Result<(), StoreError> {
        match self.alerts.get(&alert_id) {
            None => Err(StoreError::NotFound(alert_id)),
            Some(a) if a.recipient_id != recipient_id => Err(StoreError::NotOwner {
                alert_id,
                recipient_id,
            }),
            Some(_) => Ok(()),
        }
    }
}

#[async_trait]
impl AlertStore for MemoryBackend {
    async fn insert_deduped(&self, alert: NewAlert) -> Result<Option<Alert>, StoreError> {
        let mut state = self.available()?;
        if !state.members.contains_key(&alert.recipient_id) {
            return Err(StoreError::UnknownRecipient(alert.recipient_id));
        }
        if let Some(key) = &alert.dedup_key {
            let taken = state
                .alerts
                .values()
                .any(|a| a.recipient_id == alert.recipient_id && a.dedup_key.as_ref() == Some(key));
            if taken {
                return Ok(None);
            }
        }
        state.next_alert_id += 1;
        let id = state.next_alert_id;
        let created_at = state.next_timestamp();
        let row = Alert {
            id,
            recipient_id: alert.recipient_id,
            kind: alert.kind,
            category: alert.category,
            priority: alert.priority,
            title: alert.title,
            message: alert.message,
            metadata: alert.metadata,
            action_url: alert.action_url,
            read: false,
            read_at: None,
            created_at,
            dedup_key: alert.dedup_key,
        };
        state.alerts.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn list(&self, recipient_id: DbId, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let state = self.available()?;
        let mut rows: Vec<Alert> = state
            .alerts
            .values()
            .filter(|a| a.recipient_id == recipient_id)
            .filter(|a| !filter.unread_only || !a.read)
            .filter(|a| filter.kind.as_ref().map_or(true, |k| &a.kind == k))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn unread_count(&self, recipient_id: DbId) -> Result<i64, StoreError> {
        let state = self.available()?;
        Ok(state
            .alerts
            .values()
            .filter(|a| a.recipient_id == recipient_id && !a.read)
            .count() as i64)
    }

    async fn mark_read(&self, recipient_id: DbId, alert_id: DbId) -> Result<(), StoreError> {
        let mut state = self.available()?;
        state.ownership_check(recipient_id, alert_id)?;
        if let Some(alert) = state.alerts.get_mut(&alert_id) {
            alert.read = true;
            alert.read_at.get_or_insert_with(Utc::now);
        }
        Ok(())
    }

    async fn mark_all_read(&self, recipient_id: DbId) -> Result<u64, StoreError> {
        let mut state = self.available()?;
        let now = Utc::now();
        let mut count = 0;
        for alert in state
            .alerts
            .values_mut()
            .filter(|a| a.recipient_id == recipient_id && !a.read)
        {
            alert.read = true;
            alert.read_at = Some(now);
            count += 1;
        }
        Ok(count)
    }

    async fn delete(&self, recipient_id: DbId, alert_id: DbId) -> Result<(), StoreError> {
        let mut state = self.available()?;
        state.ownership_check(recipient_id, alert_id)?;
        state.alerts.remove(&alert_id);
        Ok(())
    }

    async fn clear_all(&self, recipient_id: DbId) -> Result<u64, StoreError> {
        let mut state = self.available()?;
        let before = state.alerts.len();
        state.alerts.retain(|_, a| a.recipient_id != recipient_id);
        Ok((before - state.alerts.len()) as u64)
    }

    async fn delete_read_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut state = self.available()?;
        let before = state.alerts.len();
        state.alerts.retain(|_, a| !(a.read && a.created_at < cutoff));
        Ok((before - state.alerts.len()) as u64)
    }

    async fn trim_per_recipient(&self, keep: i64) -> Result<u64, StoreError> {
        let mut state = self.available()?;
        let mut by_recipient: HashMap<DbId, Vec<(Timestamp, DbId)>> = HashMap::new();
        for alert in state.alerts.values() {
            by_recipient
                .entry(alert.recipient_id)
                .or_default()
                .push((alert.created_at, alert.id));
        }
        let mut doomed = Vec::new();
        for mut rows in by_recipient.into_values() {
            rows.sort_by(|a, b| b.cmp(a));
            doomed.extend(rows.into_iter().skip(keep.max(0) as usize).map(|(_, id)| id));
        }
        for id in &doomed {
            state.alerts.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl FleetRecords for MemoryBackend {
    async fn vehicles_due(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<Result<Vehicle, StoreError>>, StoreError> {
        let state = self.available()?;
        Ok(state
            .fleet
            .iter()
            .filter_map(|row| match row {
                FleetRow::Ok(v) => v
                    .expiries()
                    .iter()
                    .any(|(_, date)| *date <= cutoff)
                    .then(|| Ok(v.clone())),
                FleetRow::Malformed(reason) => Some(Err(StoreError::Malformed(reason.clone()))),
            })
            .collect())
    }
}

#[async_trait]
impl Directory for MemoryBackend {
    async fn contact(&self, user_id: DbId) -> Result<Option<UserContact>, StoreError> {
        let state = self.available()?;
        Ok(state
            .members
            .get(&user_id)
            .filter(|m| m.active)
            .map(|m| m.contact.clone()))
    }

    async fn active_ids_by_roles(&self, roles: &[&str]) -> Result<Vec<DbId>, StoreError> {
        let state = self.available()?;
        let mut ids: Vec<DbId> = state
            .members
            .values()
            .filter(|m| m.active && roles.contains(&m.contact.role.as_str()))
            .map(|m| m.contact.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[async_trait]
impl EmailLedger for MemoryBackend {
    async fn record(&self, entry: NewEmailLog) -> Result<(), StoreError> {
        self.available()?.email_log.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn new_alert(recipient_id: DbId, key: Option<&str>) -> NewAlert {
        NewAlert {
            recipient_id,
            kind: "vehicle_expired".into(),
            category: "warning".into(),
            priority: "high".into(),
            title: "t".into(),
            message: "m".into(),
            metadata: serde_json::json!({}),
            action_url: None,
            dedup_key: key.map(str::to_string),
        }
    }

    fn store() -> MemoryBackend {
        let store = MemoryBackend::new();
        store.add_recipients([1, 2]);
        store
    }

    #[tokio::test]
    async fn concurrent_inserts_with_one_key_yield_one_row() {
        let store = Arc::new(store());
        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.insert_deduped(new_alert(1, Some("k"))).await })
            })
            .collect();
        let mut created = 0;
        for h in handles {
            if h.await.unwrap().unwrap().is_some() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.alerts().len(), 1);
    }

    #[tokio::test]
    async fn keyless_alerts_never_conflict() {
        let store = store();
        assert!(store.insert_deduped(new_alert(1, None)).await.unwrap().is_some());
        assert!(store.insert_deduped(new_alert(1, None)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn same_key_for_other_recipient_is_accepted() {
        let store = store();
        assert!(store.insert_deduped(new_alert(1, Some("k"))).await.unwrap().is_some());
        assert!(store.insert_deduped(new_alert(2, Some("k"))).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn mark_read_distinguishes_missing_and_foreign() {
        let store = store();
        let alert = store.insert_deduped(new_alert(1, None)).await.unwrap().unwrap();
        assert_matches!(store.mark_read(2, alert.id).await, Err(StoreError::NotOwner { .. }));
        assert_matches!(store.mark_read(1, 999).await, Err(StoreError::NotFound(999)));
        store.mark_read(1, alert.id).await.unwrap();
        store.mark_read(1, alert.id).await.unwrap();
        assert_eq!(store.unread_count(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_recipient_is_rejected() {
        let store = store();
        assert_matches!(
            store.insert_deduped(new_alert(99, Some("k"))).await,
            Err(StoreError::UnknownRecipient(99))
        );
        assert!(store.alerts().is_empty());
    }

    #[tokio::test]
    async fn offline_backend_reports_unavailable() {
        let store = MemoryBackend::new();
        store.set_unavailable(true);
        let err = store.unread_count(1).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
