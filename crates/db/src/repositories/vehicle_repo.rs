//! Read-only queries against the `vehicles` table.

use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};

use crate::models::vehicle::Vehicle;

const COLUMNS: &str = "id, license_plate, brand, model, insurance_expiry, tax_expiry, \
     inspection_expiry, assigned_to";

pub struct VehicleRepo;

impl VehicleRepo {
    /// Vehicles with any deadline on or before `cutoff`, assigned or not.
    ///
    /// Rows are decoded one by one so a single malformed record yields an
    /// `Err` entry instead of failing the whole query.
    pub async fn list_due(
        pool: &PgPool,
        cutoff: NaiveDate,
    ) -> Result<Vec<Result<Vehicle, sqlx::Error>>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM vehicles \
             WHERE insurance_expiry <= $1 OR tax_expiry <= $1 OR inspection_expiry <= $1 \
             ORDER BY id"
        );
        let rows = sqlx::query(&query).bind(cutoff).fetch_all(pool).await?;
        Ok(rows.iter().map(Vehicle::from_row).collect())
    }
}
