//! JSON frames sent to feed sessions.
//!
//! ```text
//! {"type":"sync","alerts":[..],"unread_count":n}
//! {"type":"alert","alert":{..},"local_alert":{..}|null}
//! {"type":"read","ids":[..]}      {"type":"all_read"}
//! {"type":"deleted","ids":[..]}   {"type":"cleared"}
//! {"type":"resync","missed":n}    {"type":"toast","toast":{..}}
//! ```

use fleetwatch_db::models::alert::Alert;
use fleetwatch_events::{FeedEvent, LocalAlert, LocalAlertGate, Toast};
use serde_json::{json, Value};

/// Snapshot of the unread set, sent on connect and after a resync.
///
/// Tags of the snapshot are admitted to the gate so a later replay of the
/// same alerts does not raise a local alert.
pub fn sync_frame(unread: &[Alert], gate: &mut LocalAlertGate) -> Value {
    for alert in unread {
        gate.admit(&LocalAlert::tag_for(alert.id));
    }
    json!({
        "type": "sync",
        "alerts": unread,
        "unread_count": unread.len(),
    })
}

pub fn feed_frame(event: &FeedEvent, gate: &mut LocalAlertGate) -> Value {
    match event {
        FeedEvent::Created(alert) => {
            let local = LocalAlert::for_alert(alert);
            let local = gate.admit(&local.tag).then_some(local);
            json!({ "type": "alert", "alert": alert, "local_alert": local })
        }
        FeedEvent::Read { ids } => json!({ "type": "read", "ids": ids }),
        FeedEvent::AllRead => json!({ "type": "all_read" }),
        FeedEvent::Deleted { ids } => json!({ "type": "deleted", "ids": ids }),
        FeedEvent::Cleared => json!({ "type": "cleared" }),
        FeedEvent::Resync { missed } => json!({ "type": "resync", "missed": missed }),
    }
}

pub fn toast_frame(toast: &Toast) -> Value {
    json!({ "type": "toast", "toast": toast })
}
