//! Weather aggregation for ShoreSquad
//!
//! Fetches station readings (air temperature, relative humidity, rainfall)
//! and the multi-day forecast from the NEA open-data endpoints, averages the
//! readings across stations, and judges whether conditions suit a cleanup.
//! Any failure substitutes a complete static fallback report.
//!
//! Places outside Singapore are looked up on OpenWeatherMap when an API key
//! is configured; a failed lookup falls back to the Singapore report.

pub mod aggregate;
pub mod city;
pub mod fallback;
pub mod payload;
pub mod provider;
pub mod types;

pub use aggregate::{aggregate_current, mean_rainfall, mean_rounded, round_half_up, suitability};
pub use city::{CityWeather, Location, LocationWeather};
pub use provider::WeatherProvider;
pub use types::*;
