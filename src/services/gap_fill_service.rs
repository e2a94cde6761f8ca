use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::db::{DatedValue, DbError, MeterRepository, ReadingRepository};
use crate::gaps::{find_weekend_gaps, planned_points, WeekendGap, WEEKEND_READING_NOTE};

#[derive(Debug, thiserror::Error)]
pub enum GapFillError {
    #[error("Meter not found: {0}")]
    MeterNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Read-only view of the weekend gaps of one meter
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GapReport {
    pub meter_id: i64,
    pub readings_scanned: usize,
    pub points_planned: usize,
    pub gaps: Vec<WeekendGap>,
}

/// Tally of a fill run for one meter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GapFillSummary {
    pub meter_id: i64,
    pub gaps_found: usize,
    pub points_planned: usize,
    pub inserted: usize,
    /// Planned points that already had a reading when written
    pub already_present: usize,
}

/// Service for previewing and filling weekend gaps
#[derive(Clone)]
pub struct GapFillService {
    meter_repo: MeterRepository,
    reading_repo: ReadingRepository,
}

impl GapFillService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            meter_repo: MeterRepository::new(pool.clone()),
            reading_repo: ReadingRepository::new(pool),
        }
    }

    /// Detect weekend gaps against the currently stored readings
    #[instrument(skip(self))]
    pub async fn preview_weekend_gaps(&self, meter_id: i64) -> Result<GapReport, GapFillError> {
        if self.meter_repo.find_by_id(meter_id).await?.is_none() {
            return Err(GapFillError::MeterNotFound(meter_id));
        }

        let readings = self.reading_repo.find_by_meter(meter_id, None, None).await?;
        let series: Vec<DatedValue> = readings.iter().map(DatedValue::from).collect();
        let gaps = find_weekend_gaps(&series);

        debug!(
            "Found {} weekend gaps in {} readings",
            gaps.len(),
            series.len()
        );
        Ok(GapReport {
            meter_id,
            readings_scanned: series.len(),
            points_planned: planned_points(&gaps),
            gaps,
        })
    }

    /// Detect weekend gaps and write the interpolated points.
    ///
    /// Every point goes through `insert_if_absent`, so a second run (or a run
    /// racing another writer) neither duplicates nor overwrites readings.
    #[instrument(skip(self))]
    pub async fn fill_weekend_gaps(&self, meter_id: i64) -> Result<GapFillSummary, GapFillError> {
        let report = self.preview_weekend_gaps(meter_id).await?;
        let mut summary = GapFillSummary {
            meter_id,
            gaps_found: report.gaps.len(),
            points_planned: report.points_planned,
            ..Default::default()
        };

        for point in report.gaps.iter().flat_map(|g| g.weekend_points.iter()) {
            let inserted = self
                .reading_repo
                .insert_if_absent(meter_id, point.date, point.value, WEEKEND_READING_NOTE)
                .await?;
            if inserted {
                summary.inserted += 1;
            } else {
                summary.already_present += 1;
            }
        }

        info!(
            "Filled weekend gaps for meter {}: {} gaps, {} inserted, {} already present",
            meter_id, summary.gaps_found, summary.inserted, summary.already_present
        );
        Ok(summary)
    }
}
