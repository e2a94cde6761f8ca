pub mod error;
pub mod meter_repository;
pub mod models;
pub mod pool;
pub mod reading_repository;

pub use error::DbError;
pub use meter_repository::{MeterRepository, ResolvedMeter};
pub use models::*;
pub use pool::{connect, run_migrations};
pub use reading_repository::ReadingRepository;
