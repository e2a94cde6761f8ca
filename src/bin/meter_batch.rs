use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use meter_reconciliation_service::db::{self, MeterRepository, MeterType};
use meter_reconciliation_service::derived::{DerivedMeterSpec, DerivedTerm};
use meter_reconciliation_service::importers::{
    mapping, series, DelimitedImporter, ExcelImporter, ImportBatch,
};
use meter_reconciliation_service::services::{
    DerivedMeterService, GapFillService, ImportError, ImportOptions, ImportService, ImportSummary,
};
use sqlx::PgPool;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "meter-batch")]
#[command(about = "Operator batch jobs: import readings, fill weekend gaps, compute derived meters", long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, env)]
    database_url: String,

    /// Maximum database connections
    #[arg(long, default_value = "5")]
    max_connections: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a delimited grid (label column, one column per date)
    ImportCsv {
        #[arg(long)]
        file: PathBuf,

        /// Field delimiter; sniffed from the header when omitted
        #[arg(long)]
        delimiter: Option<char>,

        #[command(flatten)]
        target: ImportTarget,
    },

    /// Import the same grid layout from an xlsx workbook
    ImportExcel {
        #[arg(long)]
        file: PathBuf,

        /// Sheet name (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,

        #[command(flatten)]
        target: ImportTarget,
    },

    /// Import a JSON array of {date, value} records for one meter
    ImportSeries {
        #[arg(long)]
        file: PathBuf,

        /// Decorated meter label, e.g. "Gas Hauptzähler [749304]"
        #[arg(long)]
        label: String,

        #[command(flatten)]
        target: ImportTarget,
    },

    /// Import a JSON object {label: {date: value}}
    ImportMapping {
        #[arg(long)]
        file: PathBuf,

        #[command(flatten)]
        target: ImportTarget,
    },

    /// Report weekend gaps of a meter without writing anything
    PreviewGaps {
        #[arg(long)]
        meter_id: i64,
    },

    /// Write interpolated readings into weekend gaps
    FillGaps {
        /// Single meter to fill
        #[arg(long, conflicts_with = "facility_id", required_unless_present = "facility_id")]
        meter_id: Option<i64>,

        /// Fill every active meter of this facility
        #[arg(long)]
        facility_id: Option<i64>,
    },

    /// Compute a virtual meter from weighted source meters
    Derive {
        #[arg(long)]
        output_meter_id: i64,

        /// Source whose readings decide which dates produce a value
        #[arg(long)]
        primary_meter_id: i64,

        /// Source term as meter_id:coefficient[:unit_factor], repeatable
        #[arg(long = "term", required = true)]
        terms: Vec<DerivedTerm>,

        /// First date to consider (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date to consider (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Compute and report without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args)]
struct ImportTarget {
    /// Facility new meters are attached to
    #[arg(long)]
    facility_id: i64,

    /// Type for newly created meters (electric, gas, heating, water)
    #[arg(long)]
    meter_type: Option<MeterType>,
}

impl ImportTarget {
    fn options(&self) -> ImportOptions {
        ImportOptions {
            facility_id: self.facility_id,
            meter_type: self.meter_type,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (ignore errors if not found)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let pool = db::connect(&cli.database_url, cli.max_connections).await?;
    db::run_migrations(&pool).await?;

    match cli.command {
        Command::ImportCsv {
            file,
            delimiter,
            target,
        } => {
            let importer = match delimiter {
                Some(d) if d.is_ascii() => DelimitedImporter::with_delimiter(d as u8),
                Some(d) => return Err(format!("Delimiter '{d}' must be a single ASCII character").into()),
                None => DelimitedImporter::new(),
            };
            let batch = importer.parse_path(&file)?;
            run_import(&pool, batch, &target).await?;
        }
        Command::ImportExcel {
            file,
            sheet,
            target,
        } => {
            let path = file.to_string_lossy().to_string();
            let batch = tokio::task::spawn_blocking(move || {
                ExcelImporter::new(path).parse_sheet(sheet.as_deref())
            })
            .await??;
            run_import(&pool, batch, &target).await?;
        }
        Command::ImportSeries {
            file,
            label,
            target,
        } => {
            let records = series::from_json_str(&std::fs::read_to_string(&file)?)?;
            let batch = series::to_batch(&label, records, series::SERIES_SOURCE_NOTE);
            run_import(&pool, batch, &target).await?;
        }
        Command::ImportMapping { file, target } => {
            let readings = mapping::from_json_str(&std::fs::read_to_string(&file)?)?;
            let batch = mapping::to_batch(readings, mapping::MAPPING_SOURCE_NOTE);
            run_import(&pool, batch, &target).await?;
        }
        Command::PreviewGaps { meter_id } => preview_gaps(&pool, meter_id).await?,
        Command::FillGaps {
            meter_id,
            facility_id,
        } => fill_gaps(&pool, meter_id, facility_id).await?,
        Command::Derive {
            output_meter_id,
            primary_meter_id,
            terms,
            start,
            end,
            dry_run,
        } => {
            let spec = DerivedMeterSpec {
                output_meter_id,
                primary_meter_id,
                terms,
            };
            derive(&pool, &spec, start, end, dry_run).await?;
        }
    }

    info!("Batch completed");
    Ok(())
}

async fn run_import(
    pool: &PgPool,
    batch: ImportBatch,
    target: &ImportTarget,
) -> Result<(), Box<dyn std::error::Error>> {
    let start_time = Instant::now();
    let service = ImportService::new(pool.clone());

    match service.import_batch(&batch, &target.options()).await {
        Ok(summary) => {
            print_import_summary(&summary, start_time);
            Ok(())
        }
        Err(ImportError::StoreUnavailable { summary, source }) => {
            error!("Import aborted: {}", source);
            print_import_summary(&summary, start_time);
            Err(source.into())
        }
    }
}

fn print_import_summary(summary: &ImportSummary, start_time: Instant) {
    println!("\n============================================================");
    println!("Import Summary");
    println!("============================================================");
    println!("Rows:               {}", summary.rows);
    println!("Cells processed:    {}", summary.processed);
    println!("Inserted:           {}", summary.inserted);
    println!("Updated:            {}", summary.updated);
    println!("Skipped:            {}", summary.skipped);
    println!("Errors:             {}", summary.errors);
    println!("Meters created:     {}", summary.meters_created);
    println!("------------------------------------------------------------");
    println!(
        "Total Time:         {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    println!("============================================================");

    if !summary.error_details.is_empty() {
        println!("\nErrors:");
        for detail in &summary.error_details {
            println!("  - {detail}");
        }
    }
}

async fn preview_gaps(pool: &PgPool, meter_id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let report = GapFillService::new(pool.clone())
        .preview_weekend_gaps(meter_id)
        .await?;

    println!(
        "Meter {}: {} readings scanned, {} weekend gaps, {} points to fill",
        report.meter_id,
        report.readings_scanned,
        report.gaps.len(),
        report.points_planned
    );
    for gap in &report.gaps {
        println!(
            "  {} ({:.2}) -> {} ({:.2}), {} days, {:.4}/day",
            gap.start.date, gap.start.value, gap.end.date, gap.end.value, gap.days_diff, gap.daily_delta
        );
        for point in &gap.weekend_points {
            println!("      {} {} = {:.2}", point.date, point.date.format("%a"), point.value);
        }
    }
    Ok(())
}

async fn fill_gaps(
    pool: &PgPool,
    meter_id: Option<i64>,
    facility_id: Option<i64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = GapFillService::new(pool.clone());

    let meter_ids: Vec<i64> = match (meter_id, facility_id) {
        (Some(id), _) => vec![id],
        (None, Some(facility_id)) => MeterRepository::new(pool.clone())
            .find_active_by_facility(facility_id)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect(),
        (None, None) => return Err("--meter-id or --facility-id is required".into()),
    };

    let pb = ProgressBar::new(meter_ids.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} meters ({msg})")?
            .progress_chars("##-"),
    );

    let mut inserted = 0;
    let mut already_present = 0;
    for id in meter_ids {
        let summary = service.fill_weekend_gaps(id).await?;
        inserted += summary.inserted;
        already_present += summary.already_present;
        pb.set_message(format!("{inserted} inserted, {already_present} already present"));
        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "Complete: {inserted} inserted, {already_present} already present"
    ));
    Ok(())
}

async fn derive(
    pool: &PgPool,
    spec: &DerivedMeterSpec,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = DerivedMeterService::new(pool.clone());

    if dry_run {
        let computation = service.preview(spec, start, end).await?;
        println!(
            "Derived meter {} (dry run): {} candidate dates, {} values, {} without primary, {} non-positive",
            spec.output_meter_id,
            computation.candidate_dates,
            computation.points.len(),
            computation.dropped_no_primary,
            computation.dropped_non_positive
        );
        for point in &computation.points {
            println!("  {} = {:.3}", point.date, point.value);
        }
        return Ok(());
    }

    let summary = service.apply(spec, start, end).await?;
    println!(
        "Derived meter {}: {} applied ({} inserted, {} updated), {} unchanged, {} without primary, {} non-positive",
        summary.output_meter_id,
        summary.applied,
        summary.inserted,
        summary.updated,
        summary.unchanged,
        summary.dropped_no_primary,
        summary.dropped_non_positive
    );
    Ok(())
}
