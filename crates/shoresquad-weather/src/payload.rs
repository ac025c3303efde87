//! Wire shapes of the NEA environment endpoints.
//!
//! Readings: `{ items: [{ timestamp, readings: [{ station_id, value }] }] }`
//! Forecast: `{ items: [{ forecasts: [{ date, forecast, temperature,
//! relative_humidity, wind }] }] }`
//!
//! Only the first item of each payload is used; it holds the latest data.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::types::{ForecastDay, ReadingsSnapshot, StationReading, ValueRange, Wind};

#[derive(Debug, Deserialize)]
pub struct ReadingsResponse {
    #[serde(default)]
    pub items: Vec<ReadingsItem>,
}

#[derive(Debug, Deserialize)]
pub struct ReadingsItem {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub readings: Vec<StationReading>,
}

impl From<ReadingsResponse> for ReadingsSnapshot {
    fn from(response: ReadingsResponse) -> Self {
        match response.items.into_iter().next() {
            Some(item) => ReadingsSnapshot {
                timestamp: item.timestamp,
                readings: item.readings,
            },
            None => ReadingsSnapshot::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub items: Vec<ForecastItem>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastItem {
    #[serde(default)]
    pub forecasts: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastEntry {
    pub date: NaiveDate,
    pub forecast: String,
    pub temperature: ValueRange,
    pub relative_humidity: ValueRange,
    #[serde(default)]
    pub wind: Option<Wind>,
}

impl From<ForecastEntry> for ForecastDay {
    fn from(entry: ForecastEntry) -> Self {
        ForecastDay {
            date: entry.date,
            condition_text: entry.forecast,
            temperature: entry.temperature,
            humidity: entry.relative_humidity,
            wind: entry.wind,
        }
    }
}

impl ForecastResponse {
    /// Days of the latest forecast, in source order
    pub fn into_days(self) -> Vec<ForecastDay> {
        self.items
            .into_iter()
            .next()
            .map(|item| item.forecasts.into_iter().map(ForecastDay::from).collect())
            .unwrap_or_default()
    }
}
