use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::db::{DbError, Reading, UpsertOutcome};

const READING_COLUMNS: &str = "id, meter_id, reading_date, value, notes, created_at";

#[derive(Clone)]
pub struct ReadingRepository {
    pool: PgPool,
}

impl ReadingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update the reading for (meter, date) in one statement.
    ///
    /// A differing value replaces the stored one and the notes are tagged
    /// "(Updated)" once, however often the value changes. An identical value
    /// writes nothing and reports `Skipped`.
    /// `xmax = 0` on the returned row tells a fresh insert from an update.
    #[instrument(skip(self, notes), fields(meter_id = meter_id, date = %date))]
    pub async fn upsert_reading(
        &self,
        meter_id: i64,
        date: NaiveDate,
        value: f64,
        notes: Option<&str>,
    ) -> Result<UpsertOutcome, DbError> {
        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO meter_readings (meter_id, reading_date, value, notes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (meter_id, reading_date) DO UPDATE SET
                value = EXCLUDED.value,
                notes = CASE
                    WHEN COALESCE(EXCLUDED.notes, meter_readings.notes) LIKE '%(Updated)'
                        THEN COALESCE(EXCLUDED.notes, meter_readings.notes)
                    ELSE CONCAT_WS(' ', COALESCE(EXCLUDED.notes, meter_readings.notes), '(Updated)')
                END
            WHERE meter_readings.value IS DISTINCT FROM EXCLUDED.value
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(meter_id)
        .bind(date)
        .bind(value)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await?;

        let outcome = match inserted {
            Some(true) => UpsertOutcome::Inserted,
            Some(false) => UpsertOutcome::Updated,
            None => UpsertOutcome::Skipped,
        };
        debug!(?outcome, value, "Upserted reading");
        Ok(outcome)
    }

    /// Insert the reading only when no reading exists for (meter, date).
    ///
    /// Returns whether a row was written. Existing readings are never touched.
    #[instrument(skip(self, notes), fields(meter_id = meter_id, date = %date))]
    pub async fn insert_if_absent(
        &self,
        meter_id: i64,
        date: NaiveDate,
        value: f64,
        notes: &str,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO meter_readings (meter_id, reading_date, value, notes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (meter_id, reading_date) DO NOTHING
            "#,
        )
        .bind(meter_id)
        .bind(date)
        .bind(value)
        .bind(notes)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Readings of one meter in ascending date order.
    ///
    /// Both bounds are inclusive and optional.
    #[instrument(skip(self))]
    pub async fn find_by_meter(
        &self,
        meter_id: i64,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Reading>, DbError> {
        debug!("Querying readings for meter {}", meter_id);

        let query = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM meter_readings
            WHERE meter_id = $1
              AND ($2::DATE IS NULL OR reading_date >= $2)
              AND ($3::DATE IS NULL OR reading_date <= $3)
            ORDER BY reading_date ASC
            "#
        );
        let readings = sqlx::query_as::<_, Reading>(&query)
            .bind(meter_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        debug!("Found {} readings", readings.len());
        Ok(readings)
    }

    #[instrument(skip(self), fields(date = %date))]
    pub async fn find_one(
        &self,
        meter_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Reading>, DbError> {
        let query = format!(
            "SELECT {READING_COLUMNS} FROM meter_readings WHERE meter_id = $1 AND reading_date = $2"
        );
        let reading = sqlx::query_as::<_, Reading>(&query)
            .bind(meter_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        Ok(reading)
    }

    #[instrument(skip(self))]
    pub async fn count_for_meter(&self, meter_id: i64) -> Result<usize, DbError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM meter_readings WHERE meter_id = $1")
                .bind(meter_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count as usize)
    }
}
