use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};

use crate::db::{DbError, MeterRepository, MeterType, ReadingRepository, UpsertOutcome};
use crate::importers::{ImportBatch, ImportRow};
use crate::normalize::{extract_serial, normalize_date};

/// Fatal errors of an import run
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The store went away mid-batch. Carries everything tallied before the failure.
    #[error("Store unavailable after {} processed cells: {source}", .summary.processed)]
    StoreUnavailable {
        summary: ImportSummary,
        #[source]
        source: DbError,
    },
}

/// Tally of an import run, returned on success and on abort alike
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows: usize,
    /// Non-blank cells examined
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Cells whose value was already stored unchanged
    pub skipped: usize,
    pub errors: usize,
    pub meters_created: usize,
    pub error_details: Vec<String>,
}

impl ImportSummary {
    fn record_outcome(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }

    fn record_error(&mut self, detail: String) {
        self.errors += 1;
        self.error_details.push(detail);
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows={} processed={} inserted={} updated={} skipped={} errors={} meters_created={}",
            self.rows,
            self.processed,
            self.inserted,
            self.updated,
            self.skipped,
            self.errors,
            self.meters_created
        )
    }
}

/// Per-run settings that are not part of the data itself
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Facility new meters are attached to
    pub facility_id: i64,
    /// Type of newly created meters; electric when unset
    pub meter_type: Option<MeterType>,
}

/// A row after normalization, before any store access
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRow {
    pub label: String,
    pub serial: String,
    pub values: Vec<(NaiveDate, f64)>,
    /// Cells that were examined (blank cells excluded)
    pub examined: usize,
    pub issues: Vec<String>,
}

/// Normalize one row: extract the serial and parse every cell.
///
/// Bad dates and non-numeric values become issues; they never fail the row.
pub fn prepare_row(row: &ImportRow) -> PreparedRow {
    let serial = extract_serial(&row.label);
    let mut values = Vec::with_capacity(row.cells.len());
    let mut issues = Vec::new();
    let mut examined = 0;

    for cell in &row.cells {
        let value = match cell.value.to_number() {
            Ok(Some(value)) => value,
            Ok(None) => continue,
            Err(e) => {
                examined += 1;
                issues.push(format!("{}: {}", row.label, e));
                continue;
            }
        };
        examined += 1;

        match normalize_date(&cell.date) {
            Ok(date) => values.push((date, value)),
            Err(e) => issues.push(format!("{}: {}", row.label, e)),
        }
    }

    PreparedRow {
        label: row.label.clone(),
        serial,
        values,
        examined,
        issues,
    }
}

/// Service for importing tabular meter readings
#[derive(Clone)]
pub struct ImportService {
    meter_repo: MeterRepository,
    reading_repo: ReadingRepository,
}

impl ImportService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            meter_repo: MeterRepository::new(pool.clone()),
            reading_repo: ReadingRepository::new(pool),
        }
    }

    /// Import a batch row by row.
    ///
    /// For each row the serial is extracted and the meter resolved (or created)
    /// once, then every parsed cell is upserted. A row without identity is
    /// skipped, a bad cell is skipped; both are counted as errors. Only an
    /// unavailable store stops the run, and the partial tally travels with
    /// the error.
    #[instrument(skip(self, batch, options), fields(rows = batch.rows.len(), facility_id = options.facility_id))]
    pub async fn import_batch(
        &self,
        batch: &ImportBatch,
        options: &ImportOptions,
    ) -> Result<ImportSummary, ImportError> {
        info!(
            "Starting import of {} rows ({} cells) from '{}'",
            batch.rows.len(),
            batch.cell_count(),
            batch.source_note
        );
        let mut summary = ImportSummary::default();

        for row in &batch.rows {
            summary.rows += 1;
            if let Err(source) = self.import_row(row, batch, options, &mut summary).await {
                error!(
                    label = %row.label,
                    error = %source,
                    "Store unavailable, aborting import"
                );
                return Err(ImportError::StoreUnavailable { summary, source });
            }
        }

        if summary.errors > 0 {
            warn!("Import finished with {} errors: {}", summary.errors, summary);
        } else {
            info!("Import finished: {}", summary);
        }
        Ok(summary)
    }

    /// Import one row into `summary`. Only unavailability is returned as `Err`.
    async fn import_row(
        &self,
        row: &ImportRow,
        batch: &ImportBatch,
        options: &ImportOptions,
        summary: &mut ImportSummary,
    ) -> Result<(), DbError> {
        let prepared = prepare_row(row);
        summary.processed += prepared.examined;
        for issue in prepared.issues {
            debug!("Skipping cell: {}", issue);
            summary.record_error(issue);
        }

        if prepared.values.is_empty() {
            debug!(label = %row.label, "No usable cells in row");
            return Ok(());
        }

        if prepared.serial.is_empty() {
            warn!(label = %row.label, "Row label carries no meter identity");
            summary.record_error(format!(
                "'{}': cannot resolve meter identity, row skipped",
                row.label
            ));
            return Ok(());
        }

        let resolved = match self
            .meter_repo
            .resolve_or_create_meter(
                &prepared.serial,
                &row.label,
                options.facility_id,
                options.meter_type,
            )
            .await
        {
            Ok(resolved) => resolved,
            Err(e) if e.is_unavailable() => return Err(e),
            Err(e) => {
                warn!(label = %row.label, error = %e, "Failed to resolve meter, row skipped");
                summary.record_error(format!("'{}': meter not resolved: {}", row.label, e));
                return Ok(());
            }
        };
        if resolved.created {
            summary.meters_created += 1;
        }

        for (date, value) in prepared.values {
            match self
                .reading_repo
                .upsert_reading(resolved.meter_id, date, value, Some(&batch.source_note))
                .await
            {
                Ok(outcome) => summary.record_outcome(outcome),
                Err(e) if e.is_unavailable() => return Err(e),
                Err(e) => {
                    warn!(meter_id = resolved.meter_id, %date, error = %e, "Failed to store reading");
                    summary.record_error(format!("'{}' {}: {}", row.label, date, e));
                }
            }
        }

        Ok(())
    }
}
