//! Error types for the dispatch pipeline.

use fleetwatch_core::error::CoreError;
use fleetwatch_core::types::DbId;

/// Failure reported by a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The alert id does not exist.
    #[error("Alert {0} not found")]
    NotFound(DbId),

    /// The alert exists but belongs to a different recipient.
    #[error("Alert {alert_id} does not belong to recipient {recipient_id}")]
    NotOwner { alert_id: DbId, recipient_id: DbId },

    /// No user with this id exists to receive the alert.
    #[error("Recipient {0} does not exist")]
    UnknownRecipient(DbId),

    /// The datastore could not be reached. Callers may retry.
    #[error("Datastore unavailable: {0}")]
    Unavailable(String),

    /// A single record could not be decoded.
    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Whether the operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_) => StoreError::Malformed(err.to_string()),
            other => StoreError::Database(other),
        }
    }
}

/// Failure of a dispatch call.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The caller supplied an event the catalog cannot accept.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl NotifyError {
    /// Whether a retry of the same call may succeed. Retrying is safe: a
    /// keyed event cannot produce a second alert.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Validation(_) => false,
            NotifyError::Store(e) => e.is_retryable(),
        }
    }
}

impl From<CoreError> for NotifyError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => NotifyError::Validation(msg),
            other => NotifyError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn pool_timeout_is_retryable() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert_matches!(err, StoreError::Unavailable(_));
        assert!(NotifyError::from(err).is_retryable());
    }

    #[test]
    fn row_not_found_is_not_retryable() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(!err.is_retryable());
    }

    #[test]
    fn unknown_recipient_is_not_retryable() {
        let err = StoreError::UnknownRecipient(77);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Recipient 77 does not exist");
    }

    #[test]
    fn validation_maps_through() {
        let err = NotifyError::from(CoreError::Validation("bad".into()));
        assert_matches!(err, NotifyError::Validation(ref m) if m == "bad");
        assert!(!err.is_retryable());
    }

    #[test]
    fn non_validation_core_errors_are_not_retryable() {
        let err = NotifyError::from(CoreError::Forbidden("staff only".into()));
        assert_matches!(err, NotifyError::Validation(ref m) if m.contains("staff only"));
        assert!(!err.is_retryable());
    }
}
