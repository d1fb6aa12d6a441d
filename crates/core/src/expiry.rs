//! Vehicle compliance deadlines.
//!
//! A vehicle carries three independent expiry dates. Each one is classified
//! against the warning window: lapsed dates raise `vehicle_expired`, dates
//! within the window raise `vehicle_expiry_warning`.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::catalog::EventKind;

/// Default number of days before a deadline at which warnings start.
pub const DEFAULT_WARNING_WINDOW_DAYS: i64 = 7;

/// Which of the vehicle's deadlines an alert refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryType {
    Insurance,
    Tax,
    Inspection,
}

impl ExpiryType {
    pub const ALL: [ExpiryType; 3] = [ExpiryType::Insurance, ExpiryType::Tax, ExpiryType::Inspection];

    pub fn as_str(self) -> &'static str {
        match self {
            ExpiryType::Insurance => "insurance",
            ExpiryType::Tax => "tax",
            ExpiryType::Inspection => "inspection",
        }
    }
}

/// Outcome of classifying one deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    /// The deadline is today or in the past.
    Expired { days: i64 },
    /// The deadline falls within the warning window.
    Warning { days: i64 },
}

impl ExpiryStatus {
    pub fn event_kind(self) -> EventKind {
        match self {
            ExpiryStatus::Expired { .. } => EventKind::VehicleExpired,
            ExpiryStatus::Warning { .. } => EventKind::VehicleExpiryWarning,
        }
    }

    pub fn days(self) -> i64 {
        match self {
            ExpiryStatus::Expired { days } | ExpiryStatus::Warning { days } => days,
        }
    }
}

/// Whole days from `today` until `expiry` (negative once lapsed).
pub fn days_until(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

/// Classify a deadline `days` away. `None` means nothing to report.
pub fn classify(days: i64, warning_window_days: i64) -> Option<ExpiryStatus> {
    if days <= 0 {
        Some(ExpiryStatus::Expired { days })
    } else if days <= warning_window_days {
        Some(ExpiryStatus::Warning { days })
    } else {
        None
    }
}

/// Last date that still falls inside the warning window.
pub fn warning_cutoff(today: NaiveDate, warning_window_days: i64) -> NaiveDate {
    today
        .checked_add_days(Days::new(warning_window_days.max(0) as u64))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn days_until_counts_calendar_days() {
        assert_eq!(days_until(date(2026, 3, 4), date(2026, 3, 1)), 3);
        assert_eq!(days_until(date(2026, 2, 27), date(2026, 3, 1)), -2);
    }

    #[test]
    fn today_counts_as_expired() {
        assert_eq!(classify(0, 7), Some(ExpiryStatus::Expired { days: 0 }));
        assert_eq!(classify(-30, 7), Some(ExpiryStatus::Expired { days: -30 }));
    }

    #[test]
    fn window_boundaries() {
        assert_eq!(classify(1, 7), Some(ExpiryStatus::Warning { days: 1 }));
        assert_eq!(classify(7, 7), Some(ExpiryStatus::Warning { days: 7 }));
        assert_eq!(classify(8, 7), None);
    }

    #[test]
    fn status_maps_to_event_kind() {
        assert_eq!(
            ExpiryStatus::Warning { days: 3 }.event_kind(),
            EventKind::VehicleExpiryWarning
        );
        assert_eq!(
            ExpiryStatus::Expired { days: 0 }.event_kind(),
            EventKind::VehicleExpired
        );
    }

    #[test]
    fn cutoff_is_inclusive_window_end() {
        assert_eq!(warning_cutoff(date(2026, 12, 28), 7), date(2027, 1, 4));
    }
}
