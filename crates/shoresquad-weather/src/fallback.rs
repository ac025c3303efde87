//! Static dataset shown whenever live data cannot be fetched.
//!
//! The fallback is always substituted whole; it is never merged with
//! partially fetched live data.

use chrono::{NaiveDate, Utc};

use crate::types::{
    CurrentConditions, ForecastDay, ReportSource, ValueRange, WeatherReport,
};

const FORECAST: [(i32, u32, u32, &str, (f64, f64), (f64, f64)); 4] = [
    (2025, 6, 2, "Partly Cloudy (Day), Partly Cloudy (Night)", (26.0, 32.0), (60.0, 85.0)),
    (2025, 6, 3, "Thundery Showers", (25.0, 30.0), (70.0, 90.0)),
    (2025, 6, 4, "Partly Cloudy (Day), Fair (Night)", (26.0, 33.0), (60.0, 80.0)),
    (2025, 6, 5, "Fair (Day), Partly Cloudy (Night)", (27.0, 34.0), (65.0, 85.0)),
];

/// Typical conditions: 29 °C, 78 % humidity, 0.2 mm rain
pub fn current() -> CurrentConditions {
    CurrentConditions {
        temperature_c: Some(29),
        humidity_pct: Some(78),
        rainfall_mm: 0.2,
        timestamp: Utc::now().to_rfc3339(),
    }
}

pub fn forecast() -> Vec<ForecastDay> {
    FORECAST
        .iter()
        .filter_map(|(y, m, d, text, (t_low, t_high), (h_low, h_high))| {
            Some(ForecastDay {
                date: NaiveDate::from_ymd_opt(*y, *m, *d)?,
                condition_text: (*text).to_string(),
                temperature: ValueRange { low: *t_low, high: *t_high },
                humidity: ValueRange { low: *h_low, high: *h_high },
                wind: None,
            })
        })
        .collect()
}

/// The complete fallback report for `location`
pub fn report(location: &str) -> WeatherReport {
    WeatherReport {
        current: current(),
        forecast: forecast(),
        location: location.to_string(),
        source: ReportSource::Fallback,
        fetched_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Suitability;

    #[test]
    fn test_fallback_is_complete() {
        let report = report("Singapore");
        assert_eq!(report.forecast.len(), 4);
        assert_eq!(report.current.temperature_c, Some(29));
        assert_eq!(report.current.humidity_pct, Some(78));
        assert_eq!(report.current.rainfall_mm, 0.2);
        assert!(report.is_fallback());
    }

    #[test]
    fn test_fallback_is_suitable() {
        assert_eq!(report("Singapore").suitability(), Suitability::Suitable);
    }

    #[test]
    fn test_fallback_forecast_is_chronological() {
        let days = forecast();
        assert!(days.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(days[1].condition_text, "Thundery Showers");
    }
}
