//! Current weather for places outside Singapore, from the OpenWeatherMap
//! current-weather endpoint (`units=metric`).
//!
//! Payload: `{ name, sys: { country }, main: { temp, feels_like, humidity },
//! weather: [{ description }], wind: { speed }, visibility }` with wind in m/s
//! and visibility in metres.

use serde::{Deserialize, Serialize};

use crate::aggregate::round_half_up;
use crate::types::{Suitability, WeatherReport};

/// Exclusive temperature bounds for a suitable cleanup abroad, in °C
pub const CITY_MIN_TEMPERATURE_C: i64 = 5;
pub const CITY_MAX_TEMPERATURE_C: i64 = 35;
/// Wind must stay below this, in km/h
pub const CITY_MAX_WIND_KMH: i64 = 25;
/// Humidity must stay below this, in %
pub const CITY_MAX_HUMIDITY_PCT: i64 = 80;

/// What the user asked weather for
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Name(String),
    Coordinates { lat: f64, lon: f64 },
}

impl Location {
    /// `"1.35,103.8"` reads as coordinates, anything else as a place name
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Some((lat, lon)) = input.split_once(',') {
            if let (Ok(lat), Ok(lon)) = (lat.trim().parse(), lon.trim().parse()) {
                return Self::Coordinates { lat, lon };
            }
        }
        Self::Name(input.to_string())
    }

    /// Empty input and anything mentioning Singapore is served by NEA data
    pub fn is_singapore(input: &str) -> bool {
        let query = input.trim().to_lowercase();
        query.is_empty() || query.contains("singapore") || query.contains("sg")
    }

    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Name(name) => vec![("q", name.clone())],
            Self::Coordinates { lat, lon } => vec![("lat", lat.to_string()), ("lon", lon.to_string())],
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{}", name),
            Self::Coordinates { lat, lon } => write!(f, "{}, {}", lat, lon),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CityWeatherResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sys: Option<CitySys>,
    pub main: CityMain,
    #[serde(default)]
    pub weather: Vec<CityCondition>,
    #[serde(default)]
    pub wind: Option<CityWind>,
    #[serde(default)]
    pub visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CitySys {
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CityMain {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
}

#[derive(Debug, Deserialize)]
pub struct CityCondition {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CityWind {
    /// m/s
    pub speed: f64,
}

/// Current conditions at one place, in display units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityWeather {
    /// `"Name, CC"`, or just the name when the country is missing
    pub location: String,
    pub condition: String,
    pub temperature_c: i64,
    pub feels_like_c: i64,
    pub humidity_pct: i64,
    pub wind_kmh: i64,
    pub visibility_km: Option<i64>,
}

impl From<CityWeatherResponse> for CityWeather {
    fn from(body: CityWeatherResponse) -> Self {
        let location = match body.sys.and_then(|s| s.country).filter(|c| !c.is_empty()) {
            Some(country) => format!("{}, {}", body.name, country),
            None => body.name,
        };
        let condition = body
            .weather
            .into_iter()
            .next()
            .map(|w| capitalize(&w.description))
            .unwrap_or_default();

        CityWeather {
            location,
            condition,
            temperature_c: round_half_up(body.main.temp),
            feels_like_c: round_half_up(body.main.feels_like),
            humidity_pct: round_half_up(body.main.humidity),
            wind_kmh: round_half_up(body.wind.map_or(0.0, |w| w.speed) * 3.6),
            visibility_km: body
                .visibility
                .filter(|v| *v > 0.0)
                .map(|v| round_half_up(v / 1000.0)),
        }
    }
}

impl CityWeather {
    pub fn suitability(&self) -> Suitability {
        let suitable = self.temperature_c > CITY_MIN_TEMPERATURE_C
            && self.temperature_c < CITY_MAX_TEMPERATURE_C
            && self.wind_kmh < CITY_MAX_WIND_KMH
            && self.humidity_pct < CITY_MAX_HUMIDITY_PCT;

        if suitable {
            Suitability::Suitable
        } else {
            Suitability::CheckConditions
        }
    }

    pub fn verdict(&self) -> &'static str {
        match self.suitability() {
            Suitability::Suitable => "Great for cleanup!",
            Suitability::CheckConditions => "Check conditions",
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Result of a free-text weather lookup
#[derive(Debug, Clone)]
pub enum LocationWeather {
    /// NEA report, either asked for or substituted after a failed city lookup
    Singapore(WeatherReport),
    City(CityWeather),
}
