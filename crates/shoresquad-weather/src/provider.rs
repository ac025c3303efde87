use reqwest::Client;
use serde::de::DeserializeOwned;
use shoresquad_core::{CurrentConditionsPolicy, WeatherConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::aggregate::aggregate_current;
use crate::city::{CityWeather, CityWeatherResponse, Location, LocationWeather};
use crate::fallback;
use crate::payload::{ForecastResponse, ReadingsResponse};
use crate::types::{
    CurrentConditions, ForecastDay, Metric, ReadingsSnapshot, ReportSource, WeatherError,
    WeatherReport,
};

/// Fetches and aggregates weather from the configured endpoints.
///
/// Cheap to clone; clones share one HTTP client.
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    config: Arc<WeatherConfig>,
}

impl WeatherProvider {
    pub fn new(config: WeatherConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            config: Arc::new(config),
        })
    }

    fn endpoint(&self, metric: Metric) -> &str {
        match metric {
            Metric::AirTemperature => &self.config.air_temperature_url,
            Metric::RelativeHumidity => &self.config.relative_humidity_url,
            Metric::Rainfall => &self.config.rainfall_url,
        }
    }

    /// GET `url` and decode the JSON body. Errors name the endpoint without
    /// its query string so API keys never reach logs.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| WeatherError::Network {
                endpoint: url.to_string(),
                source: source.without_url(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status {
                endpoint: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| WeatherError::Parse {
            endpoint: url.to_string(),
            message: e.without_url().to_string(),
        })
    }

    /// Latest station readings for one metric
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_readings(&self, metric: Metric) -> Result<ReadingsSnapshot, WeatherError> {
        let body: ReadingsResponse = self.get_json(self.endpoint(metric), &[]).await?;
        let snapshot = ReadingsSnapshot::from(body);
        tracing::debug!(
            "Fetched {} {} readings",
            snapshot.readings.len(),
            metric.description()
        );
        Ok(snapshot)
    }

    /// Current conditions from three concurrent station reads.
    ///
    /// Under [`CurrentConditionsPolicy::AllOrNothing`] the first failed read
    /// fails the whole group and the successful reads are discarded.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_current(&self) -> Result<CurrentConditions, WeatherError> {
        let (temperature, humidity, rainfall) = match self.config.current_policy {
            CurrentConditionsPolicy::AllOrNothing => tokio::try_join!(
                self.fetch_readings(Metric::AirTemperature),
                self.fetch_readings(Metric::RelativeHumidity),
                self.fetch_readings(Metric::Rainfall),
            )
            .map_err(|e| WeatherError::CurrentConditions(Box::new(e)))?,
            CurrentConditionsPolicy::BestEffort => {
                let (temperature, humidity, rainfall) = tokio::join!(
                    self.fetch_readings(Metric::AirTemperature),
                    self.fetch_readings(Metric::RelativeHumidity),
                    self.fetch_readings(Metric::Rainfall),
                );
                best_effort(temperature, humidity, rainfall)?
            }
        };

        Ok(aggregate_current(&temperature, &humidity, &rainfall))
    }

    /// Multi-day forecast, fetched independently of current conditions
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_forecast(&self) -> Result<Vec<ForecastDay>, WeatherError> {
        let body: ForecastResponse = self
            .get_json(&self.config.forecast_url, &[])
            .await
            .map_err(|e| WeatherError::Forecast(Box::new(e)))?;
        Ok(body.into_days())
    }

    /// Current conditions and forecast, both live.
    ///
    /// The two groups run concurrently and fail independently; either failure
    /// fails the call.
    pub async fn get_conditions(
        &self,
    ) -> Result<(CurrentConditions, Vec<ForecastDay>), WeatherError> {
        let (current, forecast) = tokio::join!(self.fetch_current(), self.fetch_forecast());
        Ok((current?, forecast?))
    }

    /// A complete report: live when every read succeeds, otherwise the static
    /// fallback in full. Never fails.
    pub async fn fetch_report(&self) -> WeatherReport {
        match self.get_conditions().await {
            Ok((current, forecast)) => {
                tracing::info!(
                    "Weather updated: {:?}°C, {:?}% humidity, {} mm rain",
                    current.temperature_c,
                    current.humidity_pct,
                    current.rainfall_mm
                );
                WeatherReport {
                    current,
                    forecast,
                    location: self.config.location_name.clone(),
                    source: ReportSource::Live,
                    fetched_at: chrono::Utc::now(),
                }
            }
            Err(e) => {
                tracing::warn!("Weather fetch failed, using fallback data: {}", e);
                fallback::report(&self.config.location_name)
            }
        }
    }

    /// Current weather for a place outside Singapore, in metric units
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_city(&self, location: &Location) -> Result<CityWeather, WeatherError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(WeatherError::MissingApiKey)?;

        let mut query = location.query_pairs();
        query.push(("appid", api_key.to_string()));
        query.push(("units", "metric".to_string()));

        let body: CityWeatherResponse = self.get_json(&self.config.city_weather_url, &query).await?;
        let city = CityWeather::from(body);
        tracing::info!("City weather for {}: {}°C", city.location, city.temperature_c);
        Ok(city)
    }

    /// Weather for free-text input.
    ///
    /// Empty input and Singapore queries get the NEA report. Anything else is
    /// looked up as a city; when that fails the Singapore report is returned.
    pub async fn lookup(&self, input: &str) -> LocationWeather {
        if Location::is_singapore(input) {
            return LocationWeather::Singapore(self.fetch_report().await);
        }

        let location = Location::parse(input);
        match self.fetch_city(&location).await {
            Ok(city) => LocationWeather::City(city),
            Err(e) => {
                tracing::warn!(
                    "Weather for {} not available, showing Singapore instead: {}",
                    location,
                    e
                );
                LocationWeather::Singapore(self.fetch_report().await)
            }
        }
    }
}

fn best_effort(
    temperature: Result<ReadingsSnapshot, WeatherError>,
    humidity: Result<ReadingsSnapshot, WeatherError>,
    rainfall: Result<ReadingsSnapshot, WeatherError>,
) -> Result<(ReadingsSnapshot, ReadingsSnapshot, ReadingsSnapshot), WeatherError> {
    let mut failures = Vec::new();
    let mut keep = |result: Result<ReadingsSnapshot, WeatherError>| match result {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("Treating failed read as empty: {}", e);
            failures.push(e);
            ReadingsSnapshot::default()
        }
    };

    let snapshots = (keep(temperature), keep(humidity), keep(rainfall));

    if failures.len() == 3 {
        tracing::warn!("All current-condition reads failed");
        if let Some(first) = failures.into_iter().next() {
            return Err(WeatherError::CurrentConditions(Box::new(first)));
        }
    }

    Ok(snapshots)
}
