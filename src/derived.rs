//! Virtual meters computed as weighted sums of other meters' series.
//!
//! A building without its own meter is often modelled as the supply meter
//! minus the sub-metered tenants, e.g. `main = gas * 0.01 - police - bike`.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::DatedValue;
use crate::utils::round_to;

pub const DERIVED_READING_NOTE: &str = "Derived meter calculation";

/// Decimal places of persisted derived values
const DERIVED_PLACES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DerivedSpecError {
    #[error("Derived meter needs at least one source term")]
    NoTerms,

    #[error("Primary meter {0} is not one of the source terms")]
    PrimaryNotASource(i64),

    #[error("Output meter {0} cannot be one of its own sources")]
    OutputIsSource(i64),

    #[error("Invalid term '{0}': expected meter_id:coefficient[:unit_factor]")]
    InvalidTerm(String),

    #[error("Term for meter {0} has a non-finite coefficient or unit factor")]
    NonFiniteTerm(i64),
}

/// One `coefficient * unit_factor * source` summand
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedTerm {
    pub meter_id: i64,
    pub coefficient: f64,
    #[serde(default = "default_unit_factor")]
    pub unit_factor: f64,
}

fn default_unit_factor() -> f64 {
    1.0
}

impl DerivedTerm {
    pub fn new(meter_id: i64, coefficient: f64, unit_factor: f64) -> Self {
        Self {
            meter_id,
            coefficient,
            unit_factor,
        }
    }

    fn weight(&self) -> f64 {
        self.coefficient * self.unit_factor
    }
}

impl FromStr for DerivedTerm {
    type Err = DerivedSpecError;

    /// Parses `meter_id:coefficient` or `meter_id:coefficient:unit_factor`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DerivedSpecError::InvalidTerm(s.to_string());
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();

        let (meter, coefficient, unit_factor) = match parts.as_slice() {
            [meter, coefficient] => (*meter, *coefficient, "1"),
            [meter, coefficient, unit_factor] => (*meter, *coefficient, *unit_factor),
            _ => return Err(invalid()),
        };

        Ok(DerivedTerm {
            meter_id: meter.parse().map_err(|_| invalid())?,
            coefficient: coefficient.parse().map_err(|_| invalid())?,
            unit_factor: unit_factor.parse().map_err(|_| invalid())?,
        })
    }
}

/// Definition of a virtual meter. Not persisted; supplied per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMeterSpec {
    pub output_meter_id: i64,
    /// A date only yields a value when this source has a real reading on it
    pub primary_meter_id: i64,
    pub terms: Vec<DerivedTerm>,
}

impl DerivedMeterSpec {
    pub fn validate(&self) -> Result<(), DerivedSpecError> {
        if self.terms.is_empty() {
            return Err(DerivedSpecError::NoTerms);
        }
        if let Some(term) = self
            .terms
            .iter()
            .find(|t| !t.coefficient.is_finite() || !t.unit_factor.is_finite())
        {
            return Err(DerivedSpecError::NonFiniteTerm(term.meter_id));
        }
        if self.terms.iter().any(|t| t.meter_id == self.output_meter_id) {
            return Err(DerivedSpecError::OutputIsSource(self.output_meter_id));
        }
        if !self.terms.iter().any(|t| t.meter_id == self.primary_meter_id) {
            return Err(DerivedSpecError::PrimaryNotASource(self.primary_meter_id));
        }
        Ok(())
    }

    /// Distinct source meter ids in term order
    pub fn source_meter_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            if !ids.contains(&term.meter_id) {
                ids.push(term.meter_id);
            }
        }
        ids
    }
}

/// Result of evaluating a spec over loaded source series
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedComputation {
    /// Dates present in at least one source
    pub candidate_dates: usize,
    pub points: Vec<DatedValue>,
    pub dropped_no_primary: usize,
    pub dropped_non_positive: usize,
}

/// Evaluate `spec` over the given source series.
///
/// Dates are the union over all sources; a source without a reading on a date
/// contributes zero. A date is kept only when the primary source has a reading
/// on it and the weighted sum, rounded to three decimals, is strictly
/// positive.
pub fn compute_derived(
    spec: &DerivedMeterSpec,
    sources: &HashMap<i64, Vec<DatedValue>>,
) -> DerivedComputation {
    let by_meter: HashMap<i64, HashMap<NaiveDate, f64>> = sources
        .iter()
        .map(|(meter_id, series)| {
            let map = series.iter().map(|p| (p.date, p.value)).collect();
            (*meter_id, map)
        })
        .collect();

    let all_dates: BTreeSet<NaiveDate> = spec
        .source_meter_ids()
        .iter()
        .filter_map(|id| by_meter.get(id))
        .flat_map(|map| map.keys().copied())
        .collect();

    let mut computation = DerivedComputation {
        candidate_dates: all_dates.len(),
        ..Default::default()
    };

    let primary = by_meter.get(&spec.primary_meter_id);

    for date in all_dates {
        if !primary.is_some_and(|map| map.contains_key(&date)) {
            computation.dropped_no_primary += 1;
            continue;
        }

        let result: f64 = spec
            .terms
            .iter()
            .map(|term| {
                let value = by_meter
                    .get(&term.meter_id)
                    .and_then(|map| map.get(&date))
                    .copied()
                    .unwrap_or(0.0);
                term.weight() * value
            })
            .sum();

        let rounded = round_to(result, DERIVED_PLACES);
        if rounded > 0.0 {
            computation.points.push(DatedValue::new(date, rounded));
        } else {
            computation.dropped_non_positive += 1;
        }
    }

    computation
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAS: i64 = 1;
    const POLICE: i64 = 2;
    const BIKE: i64 = 3;
    const MAIN: i64 = 10;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn main_building_spec() -> DerivedMeterSpec {
        DerivedMeterSpec {
            output_meter_id: MAIN,
            primary_meter_id: GAS,
            terms: vec![
                DerivedTerm::new(GAS, 1.0, 0.01),
                DerivedTerm::new(POLICE, -1.0, 1.0),
                DerivedTerm::new(BIKE, -1.0, 1.0),
            ],
        }
    }

    #[test]
    fn test_weighted_sum_with_unit_conversion() {
        let sources = HashMap::from([
            (GAS, vec![DatedValue::new(day(2), 2_038_857.0)]),
            (POLICE, vec![DatedValue::new(day(2), 5_027.34)]),
            (BIKE, vec![DatedValue::new(day(2), 773.15)]),
        ]);

        let result = compute_derived(&main_building_spec(), &sources);

        assert_eq!(result.points, vec![DatedValue::new(day(2), 14_588.08)]);
        assert_eq!(result.candidate_dates, 1);
    }

    #[test]
    fn test_primary_absent_drops_date_even_with_other_sources() {
        let sources = HashMap::from([
            (GAS, vec![DatedValue::new(day(2), 2_038_857.0)]),
            (
                POLICE,
                vec![
                    DatedValue::new(day(2), 5_027.34),
                    DatedValue::new(day(3), 5_030.0),
                ],
            ),
            (BIKE, vec![DatedValue::new(day(3), 774.0)]),
        ]);

        let result = compute_derived(&main_building_spec(), &sources);

        assert_eq!(result.candidate_dates, 2);
        assert_eq!(result.dropped_no_primary, 1);
        assert_eq!(result.points.len(), 1);
        assert_eq!(result.points[0].date, day(2));
    }

    #[test]
    fn test_lagging_subtractive_source_counts_as_zero() {
        let sources = HashMap::from([
            (GAS, vec![DatedValue::new(day(6), 1_000_000.0)]),
            (POLICE, vec![DatedValue::new(day(6), 2_000.0)]),
            (BIKE, vec![DatedValue::new(day(3), 500.0)]),
        ]);

        let result = compute_derived(&main_building_spec(), &sources);

        // Bike has nothing on the 6th and contributes zero there
        assert_eq!(result.points, vec![DatedValue::new(day(6), 8_000.0)]);
        assert_eq!(result.dropped_no_primary, 1);
    }

    #[test]
    fn test_non_positive_results_are_dropped_not_zeroed() {
        let sources = HashMap::from([
            (
                GAS,
                vec![
                    DatedValue::new(day(2), 100_000.0),
                    DatedValue::new(day(3), 300_000.0),
                ],
            ),
            (
                POLICE,
                vec![
                    DatedValue::new(day(2), 1_000.0),
                    DatedValue::new(day(3), 1_000.0),
                ],
            ),
            (BIKE, vec![]),
        ]);

        let result = compute_derived(&main_building_spec(), &sources);

        // 1000 - 1000 = 0 on the 2nd, 3000 - 1000 on the 3rd
        assert_eq!(result.points, vec![DatedValue::new(day(3), 2_000.0)]);
        assert_eq!(result.dropped_non_positive, 1);
    }

    #[test]
    fn test_result_rounding_to_zero_is_dropped() {
        let spec = DerivedMeterSpec {
            output_meter_id: MAIN,
            primary_meter_id: GAS,
            terms: vec![
                DerivedTerm::new(GAS, 1.0, 1.0),
                DerivedTerm::new(POLICE, -1.0, 1.0),
            ],
        };
        let sources = HashMap::from([
            (GAS, vec![DatedValue::new(day(2), 100.0004)]),
            (POLICE, vec![DatedValue::new(day(2), 100.0)]),
        ]);

        let result = compute_derived(&spec, &sources);

        assert!(result.points.is_empty());
        assert_eq!(result.dropped_non_positive, 1);
    }

    #[test]
    fn test_missing_source_series_contributes_zero() {
        let sources = HashMap::from([(GAS, vec![DatedValue::new(day(2), 50_000.0)])]);

        let result = compute_derived(&main_building_spec(), &sources);

        assert_eq!(result.points, vec![DatedValue::new(day(2), 500.0)]);
    }

    #[test]
    fn test_points_are_in_date_order() {
        let sources = HashMap::from([(
            GAS,
            vec![
                DatedValue::new(day(9), 900.0),
                DatedValue::new(day(2), 200.0),
                DatedValue::new(day(5), 500.0),
            ],
        )]);
        let spec = DerivedMeterSpec {
            output_meter_id: MAIN,
            primary_meter_id: GAS,
            terms: vec![DerivedTerm::new(GAS, 1.0, 1.0)],
        };

        let dates: Vec<NaiveDate> = compute_derived(&spec, &sources)
            .points
            .iter()
            .map(|p| p.date)
            .collect();

        assert_eq!(dates, vec![day(2), day(5), day(9)]);
    }

    #[test]
    fn test_term_from_str() {
        assert_eq!(
            "4:-1".parse::<DerivedTerm>().unwrap(),
            DerivedTerm::new(4, -1.0, 1.0)
        );
        assert_eq!(
            " 7 : 1 : 0.01 ".parse::<DerivedTerm>().unwrap(),
            DerivedTerm::new(7, 1.0, 0.01)
        );
        assert!(matches!(
            "gas:1".parse::<DerivedTerm>(),
            Err(DerivedSpecError::InvalidTerm(_))
        ));
        assert!("1".parse::<DerivedTerm>().is_err());
        assert!("1:2:3:4".parse::<DerivedTerm>().is_err());
    }

    #[test]
    fn test_validate() {
        assert!(main_building_spec().validate().is_ok());

        let mut spec = main_building_spec();
        spec.terms.clear();
        assert_eq!(spec.validate(), Err(DerivedSpecError::NoTerms));

        let mut spec = main_building_spec();
        spec.primary_meter_id = 99;
        assert_eq!(spec.validate(), Err(DerivedSpecError::PrimaryNotASource(99)));

        let mut spec = main_building_spec();
        spec.terms.push(DerivedTerm::new(MAIN, 1.0, 1.0));
        assert_eq!(spec.validate(), Err(DerivedSpecError::OutputIsSource(MAIN)));

        let mut spec = main_building_spec();
        spec.terms[1].coefficient = f64::NAN;
        assert_eq!(spec.validate(), Err(DerivedSpecError::NonFiniteTerm(POLICE)));
    }

    #[test]
    fn test_source_meter_ids_are_distinct() {
        let mut spec = main_building_spec();
        spec.terms.push(DerivedTerm::new(GAS, 0.5, 1.0));
        assert_eq!(spec.source_meter_ids(), vec![GAS, POLICE, BIKE]);
    }

    #[test]
    fn test_spec_deserializes_with_default_unit_factor() {
        let spec: DerivedMeterSpec = serde_json::from_str(
            r#"{"output_meter_id": 10, "primary_meter_id": 1,
                "terms": [{"meter_id": 1, "coefficient": 1.0, "unit_factor": 0.01},
                          {"meter_id": 2, "coefficient": -1.0}]}"#,
        )
        .unwrap();
        assert_eq!(spec.terms[1].unit_factor, 1.0);
        assert!(spec.validate().is_ok());
    }
}
