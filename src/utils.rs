//! Shared numeric helpers for the reconciliation engine

/// Round `value` to `places` decimal places (half away from zero).
///
/// Negative zero is folded into `0.0` so rounded results serialize cleanly.
///
/// # Examples
///
/// ```
/// use meter_reconciliation_service::utils::round_to;
///
/// assert_eq!(round_to(110.004, 2), 110.0);
/// assert_eq!(round_to(14588.0799999, 3), 14588.08);
/// assert_eq!(round_to(-0.0001, 2), 0.0);
/// ```
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0 // Converts both 0.0 and -0.0 to 0.0
    } else {
        rounded
    }
}
