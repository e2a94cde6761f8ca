use sqlx::PgPool;
use tracing::{debug, error, info, instrument};

use crate::db::{DbError, Meter, MeterStatus, MeterType};
use crate::normalize::derive_location;

const METER_COLUMNS: &str = r#"
    id, facility_id, serial_number, meter_type, location,
    installation_date, status, created_at
"#;

/// Outcome of resolving a decorated label to a meter identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMeter {
    pub meter_id: i64,
    pub created: bool,
}

#[derive(Clone)]
pub struct MeterRepository {
    pool: PgPool,
}

impl MeterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a meter by serial number, creating it on first sight.
    ///
    /// First write wins: an existing meter is returned untouched, its location
    /// and type are never overwritten. When legacy data holds the same serial
    /// more than once, the oldest row is the identity.
    #[instrument(skip(self, display_label), fields(serial = %serial, facility_id = facility_id))]
    pub async fn resolve_or_create_meter(
        &self,
        serial: &str,
        display_label: &str,
        facility_id: i64,
        meter_type: Option<MeterType>,
    ) -> Result<ResolvedMeter, DbError> {
        if let Some(existing) = self.find_by_serial(serial).await? {
            debug!(meter_id = existing.id, "Meter already registered");
            return Ok(ResolvedMeter {
                meter_id: existing.id,
                created: false,
            });
        }

        let meter_type = meter_type.unwrap_or_default();
        let location = derive_location(display_label);

        let meter_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO meters (facility_id, serial_number, meter_type, location, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(facility_id)
        .bind(serial)
        .bind(meter_type)
        .bind(&location)
        .bind(MeterStatus::Active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                serial = %serial,
                facility_id = facility_id,
                error = %e,
                "Failed to create meter"
            );
            e
        })?;

        info!(
            meter_id = meter_id,
            meter_type = %meter_type,
            location = %location,
            "Registered new meter {}",
            serial
        );

        Ok(ResolvedMeter {
            meter_id,
            created: true,
        })
    }

    #[instrument(skip(self), fields(serial = %serial))]
    pub async fn find_by_serial(&self, serial: &str) -> Result<Option<Meter>, DbError> {
        let query = format!(
            "SELECT {METER_COLUMNS} FROM meters WHERE serial_number = $1 ORDER BY id LIMIT 1"
        );
        let meter = sqlx::query_as::<_, Meter>(&query)
            .bind(serial)
            .fetch_optional(&self.pool)
            .await?;

        Ok(meter)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, meter_id: i64) -> Result<Option<Meter>, DbError> {
        debug!("Querying meter by id");

        let query = format!("SELECT {METER_COLUMNS} FROM meters WHERE id = $1");
        let meter = sqlx::query_as::<_, Meter>(&query)
            .bind(meter_id)
            .fetch_optional(&self.pool)
            .await?;

        if meter.is_some() {
            debug!("Found meter");
        } else {
            debug!("Meter not found");
        }

        Ok(meter)
    }

    #[instrument(skip(self))]
    pub async fn count(&self, facility_id: Option<i64>) -> Result<usize, DbError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM meters WHERE ($1::BIGINT IS NULL OR facility_id = $1)",
        )
        .bind(facility_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as usize)
    }

    #[instrument(skip(self))]
    pub async fn find_paginated(
        &self,
        facility_id: Option<i64>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Meter>, DbError> {
        debug!("Querying meters with offset={}, limit={}", offset, limit);

        let query = format!(
            r#"
            SELECT {METER_COLUMNS} FROM meters
            WHERE ($1::BIGINT IS NULL OR facility_id = $1)
            ORDER BY facility_id, serial_number, id
            LIMIT $2 OFFSET $3
            "#
        );
        let meters = sqlx::query_as::<_, Meter>(&query)
            .bind(facility_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        debug!("Found {} meters", meters.len());
        Ok(meters)
    }

    /// Active meters of a facility, oldest first
    #[instrument(skip(self))]
    pub async fn find_active_by_facility(&self, facility_id: i64) -> Result<Vec<Meter>, DbError> {
        let query = format!(
            "SELECT {METER_COLUMNS} FROM meters WHERE facility_id = $1 AND status = $2 ORDER BY id"
        );
        let meters = sqlx::query_as::<_, Meter>(&query)
            .bind(facility_id)
            .bind(MeterStatus::Active)
            .fetch_all(&self.pool)
            .await?;

        debug!("Found {} active meters", meters.len());
        Ok(meters)
    }
}
