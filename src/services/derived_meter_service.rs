use std::collections::HashMap;

use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use crate::db::{DatedValue, DbError, MeterRepository, ReadingRepository, UpsertOutcome};
use crate::derived::{
    compute_derived, DerivedComputation, DerivedMeterSpec, DerivedSpecError, DERIVED_READING_NOTE,
};

#[derive(Debug, thiserror::Error)]
pub enum DerivedMeterError {
    #[error("Invalid derived meter definition: {0}")]
    InvalidSpec(#[from] DerivedSpecError),

    #[error("Meter not found: {0}")]
    MeterNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Tally of one derived meter run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DerivedSummary {
    pub output_meter_id: i64,
    pub candidate_dates: usize,
    /// Points written (inserted or updated)
    pub applied: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub dropped_no_primary: usize,
    pub dropped_non_positive: usize,
}

impl DerivedSummary {
    fn from_computation(output_meter_id: i64, computation: &DerivedComputation) -> Self {
        Self {
            output_meter_id,
            candidate_dates: computation.candidate_dates,
            dropped_no_primary: computation.dropped_no_primary,
            dropped_non_positive: computation.dropped_non_positive,
            ..Default::default()
        }
    }
}

/// Service for computing virtual meters from stored source series
#[derive(Clone)]
pub struct DerivedMeterService {
    meter_repo: MeterRepository,
    reading_repo: ReadingRepository,
}

impl DerivedMeterService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            meter_repo: MeterRepository::new(pool.clone()),
            reading_repo: ReadingRepository::new(pool),
        }
    }

    /// Evaluate `spec` without writing anything
    #[instrument(skip(self, spec), fields(output_meter_id = spec.output_meter_id))]
    pub async fn preview(
        &self,
        spec: &DerivedMeterSpec,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<DerivedComputation, DerivedMeterError> {
        spec.validate()?;
        self.ensure_meters_exist(spec).await?;

        let sources = self.load_sources(spec, start, end).await?;
        Ok(compute_derived(spec, &sources))
    }

    /// Evaluate `spec` and upsert the kept points into the output meter.
    ///
    /// Upserts make re-runs idempotent: unchanged points are reported, not rewritten.
    #[instrument(skip(self, spec), fields(output_meter_id = spec.output_meter_id))]
    pub async fn apply(
        &self,
        spec: &DerivedMeterSpec,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<DerivedSummary, DerivedMeterError> {
        let computation = self.preview(spec, start, end).await?;
        let mut summary = DerivedSummary::from_computation(spec.output_meter_id, &computation);

        for point in &computation.points {
            let outcome = self
                .reading_repo
                .upsert_reading(
                    spec.output_meter_id,
                    point.date,
                    point.value,
                    Some(DERIVED_READING_NOTE),
                )
                .await?;
            match outcome {
                UpsertOutcome::Inserted => summary.inserted += 1,
                UpsertOutcome::Updated => summary.updated += 1,
                UpsertOutcome::Skipped => summary.unchanged += 1,
            }
        }
        summary.applied = summary.inserted + summary.updated;

        info!(
            "Derived meter {}: {} applied ({} new, {} updated), {} unchanged, {} without primary, {} non-positive",
            spec.output_meter_id,
            summary.applied,
            summary.inserted,
            summary.updated,
            summary.unchanged,
            summary.dropped_no_primary,
            summary.dropped_non_positive
        );
        Ok(summary)
    }

    async fn ensure_meters_exist(&self, spec: &DerivedMeterSpec) -> Result<(), DerivedMeterError> {
        let mut ids = spec.source_meter_ids();
        ids.push(spec.output_meter_id);

        for meter_id in ids {
            if self.meter_repo.find_by_id(meter_id).await?.is_none() {
                return Err(DerivedMeterError::MeterNotFound(meter_id));
            }
        }
        Ok(())
    }

    /// Load every source series, awaiting all loads together
    async fn load_sources(
        &self,
        spec: &DerivedMeterSpec,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<HashMap<i64, Vec<DatedValue>>, DbError> {
        let ids = spec.source_meter_ids();
        let loads = ids.iter().map(|meter_id| {
            let repo = self.reading_repo.clone();
            let meter_id = *meter_id;
            async move {
                let readings = repo.find_by_meter(meter_id, start, end).await?;
                let series: Vec<DatedValue> = readings.iter().map(DatedValue::from).collect();
                Ok::<_, DbError>((meter_id, series))
            }
        });

        let sources: HashMap<i64, Vec<DatedValue>> = try_join_all(loads).await?.into_iter().collect();
        debug!(
            "Loaded {} source series ({} points)",
            sources.len(),
            sources.values().map(Vec::len).sum::<usize>()
        );
        Ok(sources)
    }
}
