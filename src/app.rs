use sqlx::PgPool;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::db::{MeterRepository, ReadingRepository};
use crate::services::{GapFillService, MeterService, ReadingService};

/// Running read-only API server.
///
/// Mutating batch runs (imports, gap fills, derived meters) are operator
/// jobs driven by the `meter-batch` binary, never by this process.
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
}

impl Application {
    /// Build the services and spawn the HTTP API server (Axum)
    pub async fn build(config: Config, pool: PgPool) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        // Create repositories
        let meter_repo = MeterRepository::new(pool.clone());
        let reading_repo = ReadingRepository::new(pool.clone());

        // Create services
        let app_state = AppState {
            meter_service: MeterService::new(meter_repo),
            reading_service: ReadingService::new(reading_repo),
            gap_fill_service: GapFillService::new(pool),
        };
        let app = create_router(app_state).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        info!("Starting HTTP server on {}", addr);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

        info!("Application initialized successfully");
        Ok(Self { server_handle })
    }

    /// Run until the server stops (which runs indefinitely unless error)
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}
