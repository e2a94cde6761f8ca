pub mod derived_meter_service;
pub mod gap_fill_service;
pub mod import_service;
pub mod meter_service;
pub mod reading_service;

pub use derived_meter_service::{DerivedMeterError, DerivedMeterService, DerivedSummary};
pub use gap_fill_service::{GapFillError, GapFillService, GapFillSummary, GapReport};
pub use import_service::{ImportError, ImportOptions, ImportService, ImportSummary};
pub use meter_service::MeterService;
pub use reading_service::ReadingService;
