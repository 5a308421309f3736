//! Configuration management for the cloudburst alert service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings. Credentials
//! (weather API key, SMTP password) are only ever read from here.

use crate::CloudburstError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Weather provider settings
    pub weather: WeatherConfig,
    /// Map/POI provider settings
    pub places: PlacesConfig,
    /// Safe-zone grid search settings
    pub search: SearchConfig,
    /// Polling pipeline settings
    pub alert: AlertConfig,
    /// Risk model settings
    pub classifier: ClassifierConfig,
    /// Outgoing mail settings
    pub email: EmailConfig,
    /// User directory settings
    pub database: DatabaseConfig,
    /// HTTP API settings
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key
    pub api_key: Option<String>,
    /// Base URL for weather API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
}

/// Overpass (OpenStreetMap) configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesConfig {
    pub base_url: String,
    pub timeout_seconds: u32,
    /// Search radius around each safe zone in meters
    pub radius_m: u32,
    /// Maximum amenities attached to one safe zone
    pub limit: usize,
    /// Overpass requests allowed in flight at once
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidates farther than this from the origin are ignored
    pub radius_km: f64,
    /// Grid spacing in degrees
    pub grid_step_deg: f64,
    /// Grid extends this many steps each way from the origin
    pub grid_half_width: u32,
    pub max_results: usize,
    /// Parallel weather lookups during a sweep
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Seconds between pipeline passes
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// JSON model file; the built-in coefficients are used when unset
    pub model_path: Option<String>,
    /// Probability at or above which the model reports risk
    pub decision_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Display name on the From header
    pub from_name: String,
    pub timeout_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding registered users
    pub path: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

// Default value functions
fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_weather_timeout() -> u32 {
    10
}

fn default_places_base_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}

fn default_places_timeout() -> u32 {
    25
}

fn default_places_radius() -> u32 {
    3000
}

fn default_places_limit() -> usize {
    5
}

fn default_places_concurrency() -> usize {
    1
}

fn default_search_radius() -> f64 {
    40.0
}

fn default_grid_step() -> f64 {
    0.05
}

fn default_grid_half_width() -> u32 {
    3
}

fn default_max_results() -> usize {
    5
}

fn default_concurrency() -> usize {
    8
}

fn default_poll_interval() -> u64 {
    120
}

fn default_decision_threshold() -> f64 {
    0.5
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Cloudburst Alert System".to_string()
}

fn default_email_timeout() -> u32 {
    10
}

fn default_database_path() -> String {
    "cloudburst.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_port() -> u16 {
    5001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
            timeout_seconds: default_weather_timeout(),
        }
    }
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            base_url: default_places_base_url(),
            timeout_seconds: default_places_timeout(),
            radius_m: default_places_radius(),
            limit: default_places_limit(),
            concurrency: default_places_concurrency(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            radius_km: default_search_radius(),
            grid_step_deg: default_grid_step(),
            grid_half_width: default_grid_half_width(),
            max_results: default_max_results(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            decision_threshold: default_decision_threshold(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_name: default_from_name(),
            timeout_seconds: default_email_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl WeatherConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl PlacesConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl AlertConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

impl AppConfig {
    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // CLOUDBURST_WEATHER__API_KEY, CLOUDBURST_EMAIL__PASSWORD, ...
        builder = builder.add_source(
            Environment::with_prefix("CLOUDBURST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cloudburst").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_weather_timeout();
        }
        if self.places.base_url.is_empty() {
            self.places.base_url = default_places_base_url();
        }
        if self.places.timeout_seconds == 0 {
            self.places.timeout_seconds = default_places_timeout();
        }
        if self.places.radius_m == 0 {
            self.places.radius_m = default_places_radius();
        }
        if self.places.limit == 0 {
            self.places.limit = default_places_limit();
        }
        if self.places.concurrency == 0 {
            self.places.concurrency = default_places_concurrency();
        }
        if self.search.concurrency == 0 {
            self.search.concurrency = default_concurrency();
        }
        if self.alert.poll_interval_seconds == 0 {
            self.alert.poll_interval_seconds = default_poll_interval();
        }
        if self.email.smtp_host.is_empty() {
            self.email.smtp_host = default_smtp_host();
        }
        if self.email.timeout_seconds == 0 {
            self.email.timeout_seconds = default_email_timeout();
        }
        if self.database.path.is_empty() {
            self.database.path = default_database_path();
        }
        if self.database.max_connections == 0 {
            self.database.max_connections = default_max_connections();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        if let Some(api_key) = &self.weather.api_key {
            if api_key.is_empty() {
                return Err(CloudburstError::config(
                    "Weather API key cannot be empty if provided. Either remove it or provide a valid key."
                ).into());
            }

            if api_key.len() < 8 {
                return Err(CloudburstError::config(
                    "Weather API key appears to be invalid (too short). Please check your API key."
                ).into());
            }

            if api_key.len() > 100 {
                return Err(CloudburstError::config(
                    "Weather API key appears to be invalid (too long). Please check your API key."
                ).into());
            }
        }

        if self.email.username.is_some() != self.email.password.is_some() {
            return Err(CloudburstError::config(
                "SMTP username and password must be configured together",
            )
            .into());
        }

        Ok(())
    }

    /// Weather key for commands that talk to the provider
    pub fn require_weather_key(&self) -> Result<String, CloudburstError> {
        self.weather.api_key.clone().ok_or_else(|| {
            CloudburstError::config(
                "Weather API key is required. Set CLOUDBURST_WEATHER__API_KEY or weather.api_key",
            )
        })
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.weather.timeout_seconds > 300 || self.places.timeout_seconds > 300 {
            return Err(CloudburstError::config("API timeout cannot exceed 300 seconds").into());
        }

        if !(self.search.radius_km > 0.0 && self.search.radius_km <= 500.0) {
            return Err(
                CloudburstError::config("Search radius must be between 0 and 500 km").into(),
            );
        }

        if !(self.search.grid_step_deg > 0.0 && self.search.grid_step_deg <= 1.0) {
            return Err(CloudburstError::config(
                "Grid step must be greater than 0 and at most 1 degree",
            )
            .into());
        }

        if self.search.grid_half_width == 0 || self.search.grid_half_width > 10 {
            return Err(
                CloudburstError::config("Grid half width must be between 1 and 10").into(),
            );
        }

        if self.search.max_results == 0 || self.search.max_results > 50 {
            return Err(CloudburstError::config("Maximum results must be between 1 and 50").into());
        }

        if self.search.concurrency > 64 {
            return Err(CloudburstError::config("Search concurrency cannot exceed 64").into());
        }

        if self.places.limit > 50 {
            return Err(CloudburstError::config("Places limit cannot exceed 50").into());
        }

        if self.places.concurrency > 4 {
            return Err(CloudburstError::config("Places concurrency cannot exceed 4").into());
        }

        if self.alert.poll_interval_seconds < 10 {
            return Err(
                CloudburstError::config("Poll interval must be at least 10 seconds").into(),
            );
        }

        if !(self.classifier.decision_threshold > 0.0 && self.classifier.decision_threshold < 1.0)
        {
            return Err(CloudburstError::config(
                "Classifier decision threshold must be between 0 and 1",
            )
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(CloudburstError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(CloudburstError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Weather API", &self.weather.base_url),
            ("Places API", &self.places.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(CloudburstError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}
