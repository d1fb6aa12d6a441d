//! Read-only view of the `vehicles` table.

use chrono::NaiveDate;
use fleetwatch_core::expiry::ExpiryType;
use fleetwatch_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

/// The columns of a vehicle the expiry scanner needs.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Vehicle {
    pub id: DbId,
    pub license_plate: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub insurance_expiry: Option<NaiveDate>,
    pub tax_expiry: Option<NaiveDate>,
    pub inspection_expiry: Option<NaiveDate>,
    pub assigned_to: Option<DbId>,
}

impl Vehicle {
    /// The vehicle's deadlines that are set.
    pub fn expiries(&self) -> Vec<(ExpiryType, NaiveDate)> {
        ExpiryType::ALL
            .into_iter()
            .filter_map(|ty| {
                let date = match ty {
                    ExpiryType::Insurance => self.insurance_expiry,
                    ExpiryType::Tax => self.tax_expiry,
                    ExpiryType::Inspection => self.inspection_expiry,
                };
                date.map(|d| (ty, d))
            })
            .collect()
    }
}
