use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Kind of utility a meter measures
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize, ToSchema,
)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "lowercase")]
pub enum MeterType {
    #[default]
    #[sqlx(rename = "electric")]
    Electric,
    #[sqlx(rename = "gas")]
    Gas,
    #[sqlx(rename = "heating")]
    Heating,
    #[sqlx(rename = "water")]
    Water,
}

impl MeterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeterType::Electric => "electric",
            MeterType::Gas => "gas",
            MeterType::Heating => "heating",
            MeterType::Water => "water",
        }
    }
}

impl fmt::Display for MeterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "electric" | "electricity" | "strom" => Ok(MeterType::Electric),
            "gas" => Ok(MeterType::Gas),
            "heating" | "heat" => Ok(MeterType::Heating),
            "water" => Ok(MeterType::Water),
            other => Err(format!(
                "unknown meter type '{other}' (expected electric, gas, heating or water)"
            )),
        }
    }
}

/// Operational status of a meter
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "lowercase")]
pub enum MeterStatus {
    #[sqlx(rename = "active")]
    Active,
    #[sqlx(rename = "inactive")]
    Inactive,
    #[sqlx(rename = "broken")]
    Broken,
    #[sqlx(rename = "maintenance")]
    Maintenance,
}

// Database entity models
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Meter {
    pub id: i64,
    pub facility_id: i64,
    pub serial_number: String,
    pub meter_type: MeterType,
    pub location: String,
    pub installation_date: Option<NaiveDate>,
    pub status: MeterStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Reading {
    pub id: i64,
    pub meter_id: i64,
    pub reading_date: NaiveDate,
    /// Cumulative counter value in the meter's native unit
    pub value: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a single upsert against the (meter, date) key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// A reading with the identical value already existed; nothing was written
    Skipped,
}

/// A bare (date, value) point of a cumulative series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

impl DatedValue {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

impl From<&Reading> for DatedValue {
    fn from(reading: &Reading) -> Self {
        Self {
            date: reading.reading_date,
            value: reading.value,
        }
    }
}

// API response DTOs (to avoid circular dependency between services and api modules)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadingSeries {
    pub meter_id: i64,
    pub total_readings: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub readings: Vec<Reading>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConsumptionPoint {
    /// Date of the later reading of the pair
    pub date: NaiveDate,
    pub value: f64,
    /// Difference to the previous reading
    pub consumption: f64,
    /// Calendar days covered by `consumption`
    pub days: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConsumptionSeries {
    pub meter_id: i64,
    pub total_consumption: f64,
    pub points: Vec<ConsumptionPoint>,
}
