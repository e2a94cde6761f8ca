use crate::db::{DbError, Meter, MeterRepository};
use serde::Serialize;
use utoipa::{IntoParams, ToSchema};

// Pagination types (used by API)
#[derive(Debug, Clone, serde::Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MeterListParams {
    pub facility_id: Option<i64>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    50
}

impl MeterListParams {
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.limit()
    }

    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, 100) as i64
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeterListResponse {
    pub total_meters: usize,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub meters: Vec<Meter>,
}

#[derive(Clone)]
pub struct MeterService {
    meter_repo: MeterRepository,
}

impl MeterService {
    pub fn new(meter_repo: MeterRepository) -> Self {
        Self { meter_repo }
    }

    /// Get paginated meters with metadata
    pub async fn get_meters_paginated(
        &self,
        params: &MeterListParams,
    ) -> Result<MeterListResponse, DbError> {
        let total_meters = self.meter_repo.count(params.facility_id).await?;
        let meters = self
            .meter_repo
            .find_paginated(params.facility_id, params.offset(), params.limit())
            .await?;

        let page_size = params.limit() as u32;
        let total_pages = total_meters.div_ceil(page_size as usize) as u32;

        Ok(MeterListResponse {
            total_meters,
            page: params.page,
            page_size,
            total_pages,
            has_next_page: params.page < total_pages,
            has_prev_page: params.page > 1,
            meters,
        })
    }

    pub async fn get_meter_by_id(&self, meter_id: i64) -> Result<Option<Meter>, DbError> {
        self.meter_repo.find_by_id(meter_id).await
    }
}
