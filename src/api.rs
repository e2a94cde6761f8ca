use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::db::{
    ConsumptionPoint, ConsumptionSeries, DatedValue, Meter, MeterStatus, MeterType, Reading,
    ReadingSeries,
};
use crate::gaps::WeekendGap;
use crate::services::meter_service::{MeterListParams, MeterListResponse};
use crate::services::{GapFillError, GapFillService, GapReport, MeterService, ReadingService};

#[derive(Clone)]
pub struct AppState {
    pub meter_service: MeterService,
    pub reading_service: ReadingService,
    pub gap_fill_service: GapFillService,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Inclusive, optional date bounds
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeParams {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_all_meters,
        get_meter_by_id,
        get_readings,
        get_consumption,
        get_weekend_gaps
    ),
    components(schemas(
        HealthResponse,
        Meter,
        MeterType,
        MeterStatus,
        MeterListResponse,
        Reading,
        ReadingSeries,
        ConsumptionPoint,
        ConsumptionSeries,
        DatedValue,
        WeekendGap,
        GapReport
    )),
    tags((name = "meters", description = "Meters, readings and reconciliation reports"))
)]
pub struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/meters", get(get_all_meters))
        .route("/meters/{meter_id}", get(get_meter_by_id))
        .route("/meters/{meter_id}/readings", get(get_readings))
        .route("/meters/{meter_id}/consumption", get(get_consumption))
        .route("/meters/{meter_id}/weekend-gaps", get(get_weekend_gaps))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse)),
    tag = "meters"
)]
#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/meters",
    params(MeterListParams),
    responses((status = 200, description = "Page of meters", body = MeterListResponse)),
    tag = "meters"
)]
#[instrument(skip(state))]
async fn get_all_meters(
    State(state): State<AppState>,
    Query(params): Query<MeterListParams>,
) -> Result<Json<MeterListResponse>, StatusCode> {
    debug!(
        "Fetching meters (facility={:?}, page={}, page_size={})",
        params.facility_id, params.page, params.page_size
    );

    let response = state
        .meter_service
        .get_meters_paginated(&params)
        .await
        .map_err(|e| {
            error!("Failed to fetch meters: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    info!(
        "Retrieved {} meters (page {}/{}, total={})",
        response.meters.len(),
        response.page,
        response.total_pages,
        response.total_meters
    );

    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/meters/{meter_id}",
    params(("meter_id" = i64, Path, description = "Meter id")),
    responses(
        (status = 200, description = "Meter found", body = Meter),
        (status = 404, description = "Meter not found")
    ),
    tag = "meters"
)]
#[instrument(skip(state))]
async fn get_meter_by_id(
    State(state): State<AppState>,
    Path(meter_id): Path<i64>,
) -> Result<Json<Meter>, StatusCode> {
    let meter = state
        .meter_service
        .get_meter_by_id(meter_id)
        .await
        .map_err(|e| {
            error!("Failed to fetch meter {}: {}", meter_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or_else(|| {
            warn!("Meter {} not found", meter_id);
            StatusCode::NOT_FOUND
        })?;

    Ok(Json(meter))
}

#[utoipa::path(
    get,
    path = "/api/v1/meters/{meter_id}/readings",
    params(("meter_id" = i64, Path, description = "Meter id"), DateRangeParams),
    responses((status = 200, description = "Readings in ascending date order", body = ReadingSeries)),
    tag = "meters"
)]
#[instrument(skip(state))]
async fn get_readings(
    State(state): State<AppState>,
    Path(meter_id): Path<i64>,
    Query(range): Query<DateRangeParams>,
) -> Result<Json<ReadingSeries>, StatusCode> {
    let series = state
        .reading_service
        .get_readings(meter_id, range.start, range.end)
        .await
        .map_err(|e| {
            error!("Failed to fetch readings for meter {}: {}", meter_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    info!(
        "Retrieved {} readings for meter {}",
        series.total_readings, meter_id
    );
    Ok(Json(series))
}

#[utoipa::path(
    get,
    path = "/api/v1/meters/{meter_id}/consumption",
    params(("meter_id" = i64, Path, description = "Meter id"), DateRangeParams),
    responses((status = 200, description = "Consumption between consecutive readings", body = ConsumptionSeries)),
    tag = "meters"
)]
#[instrument(skip(state))]
async fn get_consumption(
    State(state): State<AppState>,
    Path(meter_id): Path<i64>,
    Query(range): Query<DateRangeParams>,
) -> Result<Json<ConsumptionSeries>, StatusCode> {
    let series = state
        .reading_service
        .get_consumption(meter_id, range.start, range.end)
        .await
        .map_err(|e| {
            error!("Failed to compute consumption for meter {}: {}", meter_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    info!(
        "Meter {} consumed {:.3} over {} intervals",
        meter_id,
        series.total_consumption,
        series.points.len()
    );
    Ok(Json(series))
}

#[utoipa::path(
    get,
    path = "/api/v1/meters/{meter_id}/weekend-gaps",
    params(("meter_id" = i64, Path, description = "Meter id")),
    responses(
        (status = 200, description = "Weekend gaps and the points a fill would write", body = GapReport),
        (status = 404, description = "Meter not found")
    ),
    tag = "meters"
)]
#[instrument(skip(state))]
async fn get_weekend_gaps(
    State(state): State<AppState>,
    Path(meter_id): Path<i64>,
) -> Result<Json<GapReport>, StatusCode> {
    let report = state
        .gap_fill_service
        .preview_weekend_gaps(meter_id)
        .await
        .map_err(|e| match e {
            GapFillError::MeterNotFound(_) => {
                warn!("Meter {} not found", meter_id);
                StatusCode::NOT_FOUND
            }
            GapFillError::Database(e) => {
                error!("Failed to scan weekend gaps for meter {}: {}", meter_id, e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    info!(
        "Meter {} has {} weekend gaps ({} points to fill)",
        meter_id,
        report.gaps.len(),
        report.points_planned
    );
    Ok(Json(report))
}
