//! Weather snapshot model and display methods

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Coordinate;

/// Place name used when the provider cannot resolve one
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Current conditions at a single point, normalized from the provider payload
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherSnapshot {
    /// Rain over the last hour in mm; zero when the provider reports none
    pub precipitation_mm_per_h: f64,
    /// Air temperature in Celsius
    pub temperature_c: f64,
    /// Feels-like temperature in Celsius
    pub apparent_temperature_c: f64,
    /// Cloud cover percentage (0-100)
    pub cloud_cover_pct: f64,
    /// Wind speed in m/s
    pub wind_speed_mps: f64,
    /// Relative humidity percentage (0-100)
    pub humidity_pct: f64,
    /// Atmospheric pressure in hPa
    pub pressure_hpa: f64,
    /// Human-readable description of weather conditions
    pub description: String,
    /// Nearest named place the provider resolved the query to
    pub resolved_place_name: String,
    /// Station coordinate reported by the provider, if any
    pub resolved_coordinate: Option<Coordinate>,
    /// When this snapshot was fetched
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    #[must_use]
    pub fn has_known_place(&self) -> bool {
        !self.resolved_place_name.is_empty() && self.resolved_place_name != UNKNOWN_LOCATION
    }

    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!(
            "{:.1}°C (Feels like: {:.1}°C)",
            self.temperature_c, self.apparent_temperature_c
        )
    }

    #[must_use]
    pub fn format_precipitation(&self) -> String {
        format!("{:.2} mm/h", self.precipitation_mm_per_h)
    }

    /// Format atmospheric pressure with unit
    #[must_use]
    pub fn format_pressure(&self) -> String {
        format!("{:.0} hPa", self.pressure_hpa)
    }

    /// Indented bullet list used in alert emails and CLI output
    #[must_use]
    pub fn condition_lines(&self, indent: &str) -> Vec<String> {
        vec![
            format!("{indent}- Status: {}", self.description),
            format!("{indent}- Temperature: {}", self.format_temperature()),
            format!("{indent}- Precipitation: {}", self.format_precipitation()),
            format!("{indent}- Humidity: {:.0}%", self.humidity_pct),
            format!("{indent}- Pressure: {}", self.format_pressure()),
            format!("{indent}- Wind Speed: {:.1} m/s", self.wind_speed_mps),
            format!("{indent}- Cloud Cover: {:.0}%", self.cloud_cover_pct),
        ]
    }
}
