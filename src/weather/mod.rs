//! Weather API client for OpenWeatherMap current conditions
//!
//! One outbound request per probe, no caching. Failures are typed so callers
//! can tell an unreachable provider from a payload they could not read.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::config::WeatherConfig;
use crate::models::{Coordinate, WeatherSnapshot};
use crate::{CloudburstError, Result, VERSION};

/// What to look up: a point or a free-text city name
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeTarget {
    Coordinates(Coordinate),
    City(String),
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeTarget::Coordinates(c) => write!(f, "{}", c.format_coordinates()),
            ProbeTarget::City(name) => write!(f, "{name}"),
        }
    }
}

/// Source of current weather conditions
#[async_trait]
pub trait WeatherProbe: Send + Sync {
    async fn fetch(&self, target: &ProbeTarget) -> Result<WeatherSnapshot>;
}

/// OpenWeatherMap `/weather` client
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("cloudburst/{VERSION}"))
            .build()
            .map_err(|e| CloudburstError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn query_for(target: &ProbeTarget) -> String {
        match target {
            ProbeTarget::Coordinates(c) => format!("lat={}&lon={}", c.latitude, c.longitude),
            ProbeTarget::City(name) => format!("q={}", urlencoding::encode(name.trim())),
        }
    }
}

#[async_trait]
impl WeatherProbe for OpenWeatherClient {
    #[instrument(skip(self), fields(target = %target))]
    async fn fetch(&self, target: &ProbeTarget) -> Result<WeatherSnapshot> {
        if let ProbeTarget::City(name) = target {
            if name.trim().is_empty() {
                return Err(CloudburstError::validation("City name cannot be empty"));
            }
        }

        let query = Self::query_for(target);
        debug!("OpenWeather request: {}/weather?{}", self.base_url, query);
        let url = format!(
            "{}/weather?{}&units=metric&appid={}",
            self.base_url, query, self.api_key
        );

        let start = Instant::now();
        // strip the URL from errors: it carries the api key
        let response = self.client.get(&url).send().await.map_err(|e| {
            let e = e.without_url();
            if e.is_timeout() {
                CloudburstError::upstream(format!("Weather request to {target} timed out"))
            } else {
                CloudburstError::upstream(format!("Weather request to {target} failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| {
                CloudburstError::upstream(format!(
                    "Failed to read weather response: {}",
                    e.without_url()
                ))
            })?;

        if !status.is_success() {
            let message = openweather::error_message(&body).unwrap_or_else(|| status.to_string());
            warn!("OpenWeather returned {} for {}: {}", status, target, message);
            return Err(CloudburstError::upstream(format!(
                "Error fetching data from OpenWeather ({status}): {message}"
            )));
        }

        let snapshot = openweather::parse_current(&body)?;

        let elapsed = start.elapsed();
        if elapsed > Duration::from_secs(5) {
            warn!("Slow weather response: {:.3}s", elapsed.as_secs_f64());
        }
        debug!(
            "Weather at {} resolved to '{}' ({} mm/h) in {:.3}s",
            target,
            snapshot.resolved_place_name,
            snapshot.precipitation_mm_per_h,
            elapsed.as_secs_f64()
        );

        Ok(snapshot)
    }
}

/// OpenWeatherMap response structures and conversion utilities
mod openweather {
    use super::*;
    use crate::models::UNKNOWN_LOCATION;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct CurrentResponse {
        pub name: Option<String>,
        pub coord: Option<Coord>,
        pub main: Option<MainSection>,
        pub weather: Option<Vec<Condition>>,
        pub clouds: Option<Clouds>,
        pub wind: Option<Wind>,
        pub rain: Option<Rain>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Coord {
        pub lat: f64,
        pub lon: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct MainSection {
        pub temp: f64,
        pub feels_like: f64,
        pub humidity: f64,
        pub pressure: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct Condition {
        pub description: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Clouds {
        pub all: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct Wind {
        pub speed: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct Rain {
        #[serde(rename = "1h")]
        pub one_hour: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    pub fn error_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty())
    }

    /// "light intensity rain" -> "Light Intensity Rain"
    pub fn title_case(text: &str) -> String {
        text.split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }

    fn missing(section: &str) -> CloudburstError {
        CloudburstError::malformed(format!("weather response has no '{section}' section"))
    }

    pub fn parse_current(body: &str) -> Result<WeatherSnapshot> {
        let response: CurrentResponse = serde_json::from_str(body)
            .map_err(|e| CloudburstError::malformed(format!("Invalid weather payload: {e}")))?;

        let main = response.main.ok_or_else(|| missing("main"))?;
        let conditions = response.weather.ok_or_else(|| missing("weather"))?;
        let clouds = response.clouds.ok_or_else(|| missing("clouds"))?;
        let wind = response.wind.ok_or_else(|| missing("wind"))?;

        let description = conditions
            .first()
            .map(|c| title_case(&c.description))
            .unwrap_or_else(|| "No description".to_string());

        let resolved_place_name = response
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

        Ok(WeatherSnapshot {
            precipitation_mm_per_h: response.rain.and_then(|r| r.one_hour).unwrap_or(0.0),
            temperature_c: main.temp,
            apparent_temperature_c: main.feels_like,
            cloud_cover_pct: clouds.all,
            wind_speed_mps: wind.speed,
            humidity_pct: main.humidity,
            pressure_hpa: main.pressure,
            description,
            resolved_place_name,
            resolved_coordinate: response.coord.map(|c| Coordinate {
                latitude: c.lat,
                longitude: c.lon,
            }),
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::openweather::{error_message, parse_current, title_case};
    use super::*;
    use crate::models::UNKNOWN_LOCATION;

    const RAINY: &str = r#"{
        "coord": {"lon": 72.8777, "lat": 19.076},
        "weather": [{"id": 502, "main": "Rain", "description": "heavy intensity rain"}],
        "main": {"temp": 26.4, "feels_like": 29.1, "pressure": 1002, "humidity": 94},
        "wind": {"speed": 9.3, "deg": 240},
        "rain": {"1h": 12.7},
        "clouds": {"all": 100},
        "name": "Mumbai",
        "cod": 200
    }"#;

    #[test]
    fn test_parse_full_payload() {
        let snapshot = parse_current(RAINY).unwrap();
        assert_eq!(snapshot.resolved_place_name, "Mumbai");
        assert_eq!(snapshot.precipitation_mm_per_h, 12.7);
        assert_eq!(snapshot.apparent_temperature_c, 29.1);
        assert_eq!(snapshot.humidity_pct, 94.0);
        assert_eq!(snapshot.cloud_cover_pct, 100.0);
        assert_eq!(snapshot.description, "Heavy Intensity Rain");
        assert_eq!(
            snapshot.resolved_coordinate,
            Some(Coordinate {
                latitude: 19.076,
                longitude: 72.8777
            })
        );
    }

    #[test]
    fn test_missing_rain_means_zero() {
        let body = RAINY.replace(r#""rain": {"1h": 12.7},"#, "");
        assert_eq!(parse_current(&body).unwrap().precipitation_mm_per_h, 0.0);

        let body = RAINY.replace(r#""rain": {"1h": 12.7},"#, r#""rain": {"3h": 4.0},"#);
        assert_eq!(parse_current(&body).unwrap().precipitation_mm_per_h, 0.0);
    }

    #[test]
    fn test_missing_main_is_malformed() {
        let body = RAINY.replace(
            r#""main": {"temp": 26.4, "feels_like": 29.1, "pressure": 1002, "humidity": 94},"#,
            "",
        );
        let err = parse_current(&body).unwrap_err();
        assert!(matches!(err, CloudburstError::MalformedResponse { .. }));
        assert!(err.to_string().contains("main"));
    }

    #[test]
    fn test_missing_weather_is_malformed() {
        let body = RAINY.replace(
            r#""weather": [{"id": 502, "main": "Rain", "description": "heavy intensity rain"}],"#,
            "",
        );
        assert!(matches!(
            parse_current(&body),
            Err(CloudburstError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_empty_weather_list_has_default_description() {
        let body = RAINY.replace(
            r#"[{"id": 502, "main": "Rain", "description": "heavy intensity rain"}]"#,
            "[]",
        );
        assert_eq!(parse_current(&body).unwrap().description, "No description");
    }

    #[test]
    fn test_missing_name_is_unknown_location() {
        let body = RAINY.replace(r#""name": "Mumbai","#, r#""name": "","#);
        assert_eq!(
            parse_current(&body).unwrap().resolved_place_name,
            UNKNOWN_LOCATION
        );
    }

    #[test]
    fn test_not_json_is_malformed() {
        assert!(matches!(
            parse_current("<html>"),
            Err(CloudburstError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"cod":"404","message":"city not found"}"#).as_deref(),
            Some("city not found")
        );
        assert_eq!(error_message("not json"), None);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("overcast clouds"), "Overcast Clouds");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_query_for_city_is_encoded() {
        let query = OpenWeatherClient::query_for(&ProbeTarget::City("New Delhi".to_string()));
        assert_eq!(query, "q=New%20Delhi");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_upstream_error() {
        let config = WeatherConfig {
            api_key: None,
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
        };
        let client = OpenWeatherClient::new(&config, "test_key_1234".to_string()).unwrap();
        let target = ProbeTarget::Coordinates(Coordinate {
            latitude: 19.0,
            longitude: 72.8,
        });
        let err = client.fetch(&target).await.unwrap_err();
        assert!(matches!(err, CloudburstError::UpstreamUnavailable { .. }));
    }
}
