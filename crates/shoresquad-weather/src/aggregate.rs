//! Cross-station averaging and the cleanup suitability policy.

use crate::types::{CurrentConditions, ReadingsSnapshot, Suitability};

/// Exclusive temperature bounds for a suitable cleanup, in °C
pub const MIN_TEMPERATURE_C: i64 = 20;
pub const MAX_TEMPERATURE_C: i64 = 35;
/// Rainfall must stay below this, in mm
pub const MAX_RAINFALL_MM: f64 = 1.0;
/// Humidity must stay below this, in %
pub const MAX_HUMIDITY_PCT: i64 = 85;

/// Stand-ins used when no station reported a metric
const DEFAULT_TEMPERATURE_C: i64 = 28;
const DEFAULT_HUMIDITY_PCT: i64 = 75;

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Nearest integer, halves rounding up (`-2.5` becomes `-2`)
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Mean rounded to the nearest integer, halves rounding up. `None` when empty.
pub fn mean_rounded(values: impl IntoIterator<Item = f64>) -> Option<i64> {
    mean(values).map(round_half_up)
}

/// Mean rounded to one decimal place. Zero when empty.
pub fn mean_rainfall(values: impl IntoIterator<Item = f64>) -> f64 {
    mean(values)
        .map(|m| (m * 10.0).round() / 10.0)
        .unwrap_or(0.0)
}

/// Derive current conditions from the three latest readings snapshots.
///
/// The timestamp comes from the temperature snapshot; if that carries none,
/// the current time is used.
pub fn aggregate_current(
    temperature: &ReadingsSnapshot,
    humidity: &ReadingsSnapshot,
    rainfall: &ReadingsSnapshot,
) -> CurrentConditions {
    let timestamp = temperature
        .timestamp
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

    CurrentConditions {
        temperature_c: mean_rounded(temperature.values()),
        humidity_pct: mean_rounded(humidity.values()),
        rainfall_mm: mean_rainfall(rainfall.values()),
        timestamp,
    }
}

/// Apply the fixed cleanup thresholds to a set of conditions
pub fn suitability(current: &CurrentConditions) -> Suitability {
    let temperature = current.temperature_c.unwrap_or(DEFAULT_TEMPERATURE_C);
    let humidity = current.humidity_pct.unwrap_or(DEFAULT_HUMIDITY_PCT);

    let suitable = temperature > MIN_TEMPERATURE_C
        && temperature < MAX_TEMPERATURE_C
        && current.rainfall_mm < MAX_RAINFALL_MM
        && humidity < MAX_HUMIDITY_PCT;

    if suitable {
        Suitability::Suitable
    } else {
        Suitability::CheckConditions
    }
}
