use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather aggregator settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Offline cache gateway settings
    #[serde(default)]
    pub offline: OfflineConfig,

    /// Contact outbox settings
    #[serde(default)]
    pub outbox: OutboxConfig,

    /// Event list settings
    #[serde(default)]
    pub events: EventsConfig,
}

/// How the three current-condition reads combine when one of them fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CurrentConditionsPolicy {
    /// Any failed read discards the other two and the whole fetch fails
    #[default]
    AllOrNothing,
    /// Average whatever arrived; a failed metric counts as having no stations
    BestEffort,
}

const NEA_BASE: &str = "https://api.data.gov.sg/v1/environment";
const CITY_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

fn default_city_weather_url() -> String {
    CITY_WEATHER_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Station air temperature readings
    pub air_temperature_url: String,

    /// Station relative humidity readings
    pub relative_humidity_url: String,

    /// Station rainfall readings
    pub rainfall_url: String,

    /// Multi-day forecast
    pub forecast_url: String,

    /// Label attached to every report
    pub location_name: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub current_policy: CurrentConditionsPolicy,

    /// OpenWeatherMap current-weather endpoint for places outside Singapore
    #[serde(default = "default_city_weather_url")]
    pub city_weather_url: String,

    /// OpenWeatherMap API key; city lookups are disabled without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            air_temperature_url: format!("{}/air-temperature", NEA_BASE),
            relative_humidity_url: format!("{}/relative-humidity", NEA_BASE),
            rainfall_url: format!("{}/rainfall", NEA_BASE),
            forecast_url: format!("{}/4-day-weather-forecast", NEA_BASE),
            location_name: "Singapore".to_string(),
            request_timeout_secs: 10,
            current_policy: CurrentConditionsPolicy::AllOrNothing,
            city_weather_url: default_city_weather_url(),
            api_key: None,
        }
    }
}

impl WeatherConfig {
    /// Point every endpoint at `base` (used against mock servers)
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            air_temperature_url: format!("{}/air-temperature", base),
            relative_humidity_url: format!("{}/relative-humidity", base),
            rainfall_url: format!("{}/rainfall", base),
            forecast_url: format!("{}/4-day-weather-forecast", base),
            city_weather_url: format!("{}/weather", base),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Origin whose GET requests the gateway intercepts
    pub origin: String,

    /// Cache generation name; changing it supersedes every older bucket
    pub cache_version: String,

    /// Path of the cached root document served to offline navigations
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,

    /// Static assets seeded into the bucket on install
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// SQLite file holding cache buckets; defaults to `<config_dir>/offline_cache.db`
    #[serde(default)]
    pub cache_db: Option<PathBuf>,
}

fn default_offline_fallback() -> String {
    "/index.html".to_string()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/css/styles.css",
        "/js/app.js",
        "/favicon.svg",
        "/manifest.json",
        "https://fonts.googleapis.com/css2?family=Poppins:wght@300;400;600;700&display=swap",
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            cache_version: "shoresquad-v1.0.0".to_string(),
            offline_fallback: default_offline_fallback(),
            precache: default_precache(),
            cache_db: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    /// Endpoint pending contact forms are POSTed to, relative to the origin
    pub endpoint: String,

    /// Background sync tag that triggers a replay
    pub sync_tag: String,

    /// SQLite file holding pending forms; defaults to `<config_dir>/outbox.db`
    #[serde(default)]
    pub database: Option<PathBuf>,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            endpoint: "/api/contact".to_string(),
            sync_tag: "contact-form-sync".to_string(),
            database: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Filter applied when the list is first shown (all, today, weekend, week)
    pub default_filter: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            default_filter: "all".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shoresquad");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            offline: OfflineConfig::default(),
            outbox: OutboxConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, writing defaults there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let result = config.validate();
        for warning in &result.warnings {
            tracing::warn!("Config warning: {}", warning);
        }
        if !result.is_valid() {
            return Err(ConfigError::Invalid(result.error_summary()).into());
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.air_temperature_url, "weather.air_temperature_url", &mut result);
        self.validate_url(&self.weather.relative_humidity_url, "weather.relative_humidity_url", &mut result);
        self.validate_url(&self.weather.rainfall_url, "weather.rainfall_url", &mut result);
        self.validate_url(&self.weather.forecast_url, "weather.forecast_url", &mut result);
        self.validate_url(&self.weather.city_weather_url, "weather.city_weather_url", &mut result);

        if self.weather.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            result.add_error("weather.api_key", "API key cannot be blank; remove it instead");
        }

        if self.weather.request_timeout_secs == 0 {
            result.add_error("weather.request_timeout_secs", "Timeout must be at least 1 second");
        }

        if self.weather.current_policy == CurrentConditionsPolicy::BestEffort {
            result.add_warning(
                "weather.current_policy",
                "best_effort mixes live and missing metrics in one report",
            );
        }

        self.validate_url(&self.offline.origin, "offline.origin", &mut result);

        if self.offline.cache_version.trim().is_empty() {
            result.add_error("offline.cache_version", "Cache version cannot be empty");
        }

        if !self.offline.offline_fallback.starts_with('/') {
            result.add_error(
                "offline.offline_fallback",
                "Offline fallback must be an absolute path on the origin",
            );
        }

        if self.offline.precache.is_empty() {
            result.add_warning("offline.precache", "No assets will be available offline");
        } else if !self.offline.precache.contains(&self.offline.offline_fallback) {
            result.add_warning(
                "offline.precache",
                "Offline fallback is not precached; offline navigations may fail",
            );
        }

        if !self.outbox.endpoint.starts_with('/') {
            result.add_error("outbox.endpoint", "Endpoint must be an absolute path on the origin");
        }

        if !matches!(
            self.events.default_filter.as_str(),
            "all" | "today" | "weekend" | "week"
        ) {
            result.add_warning(
                "events.default_filter",
                format!("Unknown filter '{}', showing all events", self.events.default_filter),
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                // Check scheme
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                // Check host
                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Path of the offline cache database
    pub fn cache_db_path(&self) -> PathBuf {
        self.offline
            .cache_db
            .clone()
            .unwrap_or_else(|| self.config_dir.join("offline_cache.db"))
    }

    /// Path of the contact outbox database
    pub fn outbox_db_path(&self) -> PathBuf {
        self.outbox
            .database
            .clone()
            .unwrap_or_else(|| self.config_dir.join("outbox.db"))
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("shoresquad");

        Ok(config_dir.join("config.toml"))
    }
}
