use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The three station metrics that make up current conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    AirTemperature,
    RelativeHumidity,
    Rainfall,
}

impl Metric {
    pub fn description(&self) -> &'static str {
        match self {
            Self::AirTemperature => "air temperature",
            Self::RelativeHumidity => "relative humidity",
            Self::Rainfall => "rainfall",
        }
    }
}

/// One numeric measurement reported by one observation station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReading {
    #[serde(default)]
    pub station_id: String,
    pub value: f64,
}

/// Latest readings of one metric across all stations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingsSnapshot {
    pub timestamp: Option<String>,
    pub readings: Vec<StationReading>,
}

impl ReadingsSnapshot {
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.readings.iter().map(|r| r.value)
    }
}

/// Cross-station means of the latest readings.
///
/// Temperature and humidity are `None` when no station reported; rainfall
/// falls back to zero instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: Option<i64>,
    pub humidity_pct: Option<i64>,
    pub rainfall_mm: f64,
    pub timestamp: String,
}

/// Low/high bounds as published by the forecast endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    #[serde(default)]
    pub speed: Option<ValueRange>,
    #[serde(default)]
    pub direction: Option<String>,
}

/// Daily forecast entry, kept in source (chronological) order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub condition_text: String,
    pub temperature: ValueRange,
    pub humidity: ValueRange,
    pub wind: Option<Wind>,
}

/// Whether current conditions suit an outdoor cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suitability {
    Suitable,
    CheckConditions,
}

impl Suitability {
    pub fn is_suitable(&self) -> bool {
        matches!(self, Self::Suitable)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Suitable => "Perfect for beach cleanup!",
            Self::CheckConditions => "Check weather conditions",
        }
    }
}

/// Where a report's numbers came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSource {
    Live,
    Fallback,
}

/// Complete weather dataset handed to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub current: CurrentConditions,
    pub forecast: Vec<ForecastDay>,
    pub location: String,
    pub source: ReportSource,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherReport {
    /// Verdict for the current conditions, recomputed on every call
    pub fn suitability(&self) -> Suitability {
        crate::aggregate::suitability(&self.current)
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ReportSource::Fallback
    }
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error fetching {endpoint}: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },
    #[error("Failed to parse {endpoint}: {message}")]
    Parse { endpoint: String, message: String },
    #[error("Current conditions unavailable: {0}")]
    CurrentConditions(Box<WeatherError>),
    #[error("Forecast unavailable: {0}")]
    Forecast(Box<WeatherError>),
    #[error("No OpenWeatherMap API key configured")]
    MissingApiKey,
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl WeatherError {
    /// The innermost cause, past the current/forecast group wrappers
    pub fn root(&self) -> &WeatherError {
        match self {
            Self::CurrentConditions(inner) | Self::Forecast(inner) => inner.root(),
            other => other,
        }
    }
}

impl From<WeatherError> for shoresquad_core::AppError {
    fn from(err: WeatherError) -> Self {
        use shoresquad_core::error::ReqwestErrorExt;
        use shoresquad_core::WeatherError as CoreWeatherError;

        let message = err.to_string();
        match err {
            WeatherError::CurrentConditions(inner) | WeatherError::Forecast(inner) => {
                (*inner).into()
            }
            WeatherError::Network { source, .. } | WeatherError::Client(source) => {
                source.into_network_error().into()
            }
            // 401 means the key was rejected, not that the place is unknown
            WeatherError::Status { status, .. } if status >= 500 || status == 401 => {
                CoreWeatherError::ServiceUnavailable.into()
            }
            WeatherError::MissingApiKey => CoreWeatherError::ServiceUnavailable.into(),
            WeatherError::Status { .. } => CoreWeatherError::ApiError(message).into(),
            WeatherError::Parse { .. } => CoreWeatherError::Payload(message).into(),
        }
    }
}
