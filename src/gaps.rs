//! Weekend gap detection and linear interpolation over cumulative readings.
//!
//! Readings are collected on business days, so a Friday reading followed by a
//! Monday reading leaves Saturday and Sunday empty. Those weekend days are
//! synthesized by spreading the counter increase evenly over the whole gap.
//! Weekday-only gaps (holidays) are left alone.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::db::DatedValue;
use crate::utils::round_to;

pub const WEEKEND_READING_NOTE: &str = "Auto-generated weekend reading";

/// Decimal places of synthesized readings
const INTERPOLATION_PLACES: u32 = 2;

/// Two adjacent readings with at least one Saturday or Sunday between them
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WeekendGap {
    pub start: DatedValue,
    pub end: DatedValue,
    /// Calendar days from `start` to `end`
    pub days_diff: i64,
    pub daily_delta: f64,
    /// Interpolated weekend points strictly between `start` and `end`
    pub weekend_points: Vec<DatedValue>,
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Scan readings (ascending by date) for gaps that span a weekend.
///
/// For the day at offset `n` from the earlier reading the interpolated value
/// is `start + n * (end - start) / days_diff`, rounded to two decimals. The
/// offset counts every day of the gap, weekdays included.
pub fn find_weekend_gaps(readings: &[DatedValue]) -> Vec<WeekendGap> {
    readings
        .windows(2)
        .filter_map(|pair| weekend_gap_between(pair[0], pair[1]))
        .collect()
}

fn weekend_gap_between(prev: DatedValue, curr: DatedValue) -> Option<WeekendGap> {
    let days_diff = (curr.date - prev.date).num_days();
    if days_diff < 2 {
        return None;
    }

    let daily_delta = (curr.value - prev.value) / days_diff as f64;
    let weekend_points: Vec<DatedValue> = (1..days_diff)
        .filter_map(|n| {
            let date = prev.date + Duration::days(n);
            is_weekend(date).then(|| {
                DatedValue::new(
                    date,
                    round_to(prev.value + daily_delta * n as f64, INTERPOLATION_PLACES),
                )
            })
        })
        .collect();

    if weekend_points.is_empty() {
        return None;
    }

    if daily_delta < 0.0 {
        warn!(
            from = %prev.date,
            to = %curr.date,
            prev_value = prev.value,
            curr_value = curr.value,
            "Counter decreased across weekend gap, interpolating anyway"
        );
    }

    Some(WeekendGap {
        start: prev,
        end: curr,
        days_diff,
        daily_delta,
        weekend_points,
    })
}

/// Total number of points the gaps would synthesize
pub fn planned_points(gaps: &[WeekendGap]) -> usize {
    gaps.iter().map(|g| g.weekend_points.len()).sum()
}
