use chrono::NaiveDate;

use crate::db::{ConsumptionPoint, ConsumptionSeries, DbError, Reading, ReadingRepository, ReadingSeries};
use crate::utils::round_to;

/// Decimal places of reported consumption
const CONSUMPTION_PLACES: u32 = 3;

#[derive(Clone)]
pub struct ReadingService {
    reading_repo: ReadingRepository,
}

impl ReadingService {
    pub fn new(reading_repo: ReadingRepository) -> Self {
        Self { reading_repo }
    }

    pub async fn get_readings(
        &self,
        meter_id: i64,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<ReadingSeries, DbError> {
        let readings = self.reading_repo.find_by_meter(meter_id, start, end).await?;

        Ok(ReadingSeries {
            meter_id,
            total_readings: readings.len(),
            first_date: readings.first().map(|r| r.reading_date),
            last_date: readings.last().map(|r| r.reading_date),
            readings,
        })
    }

    /// Consumption between consecutive cumulative readings
    pub async fn get_consumption(
        &self,
        meter_id: i64,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<ConsumptionSeries, DbError> {
        let readings = self.reading_repo.find_by_meter(meter_id, start, end).await?;
        let points = Self::consumption_points(&readings);
        let total = points.iter().map(|p| p.consumption).sum::<f64>();

        Ok(ConsumptionSeries {
            meter_id,
            total_consumption: round_to(total, CONSUMPTION_PLACES),
            points,
        })
    }

    /// Difference of each reading to its predecessor (readings ascending by date)
    pub fn consumption_points(readings: &[Reading]) -> Vec<ConsumptionPoint> {
        readings
            .windows(2)
            .map(|pair| {
                let (prev, curr) = (&pair[0], &pair[1]);
                ConsumptionPoint {
                    date: curr.reading_date,
                    value: curr.value,
                    consumption: round_to(curr.value - prev.value, CONSUMPTION_PLACES),
                    days: (curr.reading_date - prev.reading_date).num_days(),
                }
            })
            .collect()
    }
}
