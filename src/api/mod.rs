use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    CloudburstError,
    classifier::{RiskAssessment, RiskClassifier},
    models::{Coordinate, NewUser, UNKNOWN_LOCATION, WeatherSnapshot},
    safe_zones::{SafeCandidate, SafeZoneSearch, SearchParams},
    users::UserDirectory,
    weather::{ProbeTarget, WeatherProbe},
};

/// Shared handles for request handlers
#[derive(Clone)]
pub struct AppState {
    pub probe: Arc<dyn WeatherProbe>,
    pub classifier: Arc<dyn RiskClassifier>,
    pub search: SafeZoneSearch,
    pub users: Arc<dyn UserDirectory>,
    pub params: SearchParams,
}

/// Error response carrying a `{"message": ..}` body
#[derive(Debug)]
pub struct ApiError(CloudburstError);

impl From<CloudburstError> for ApiError {
    fn from(value: CloudburstError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CloudburstError::Validation { .. } => StatusCode::BAD_REQUEST,
            CloudburstError::DuplicateEmail { .. } => StatusCode::CONFLICT,
            CloudburstError::UpstreamUnavailable { .. }
            | CloudburstError::MalformedResponse { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "message": self.0.user_message() }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub city: Option<String>,
}

impl PredictQuery {
    /// Coordinates win over a city name when both are given
    pub fn target(&self) -> Result<ProbeTarget, CloudburstError> {
        let present = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match (present(&self.lat), present(&self.lon), present(&self.city)) {
            (Some(lat), Some(lon), _) => {
                let parse = |name: &str, raw: &str| {
                    raw.parse::<f64>().map_err(|_| {
                        CloudburstError::validation(format!("{name} must be a number, got '{raw}'"))
                    })
                };
                let coordinate = Coordinate::new(parse("lat", &lat)?, parse("lon", &lon)?)?;
                Ok(ProbeTarget::Coordinates(coordinate))
            }
            (None, None, Some(city)) => Ok(ProbeTarget::City(city)),
            _ => Err(CloudburstError::validation(
                "Latitude and longitude parameters are required",
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub apparent_temperature: f64,
    pub humidity: f64,
    pub precipitation: f64,
    pub wind_speed: f64,
    pub cloud_cover: f64,
    pub pressure: f64,
    pub description: String,
}

impl From<&WeatherSnapshot> for CurrentWeather {
    fn from(w: &WeatherSnapshot) -> Self {
        Self {
            temperature: w.temperature_c,
            apparent_temperature: w.apparent_temperature_c,
            humidity: w.humidity_pct,
            precipitation: w.precipitation_mm_per_h,
            wind_speed: w.wind_speed_mps,
            cloud_cover: w.cloud_cover_pct,
            pressure: w.pressure_hpa,
            description: w.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    /// Raw model verdict, 1 for cloudburst
    pub prediction: u8,
    /// Final decision: model verdict or the heavy-rain override
    pub alert: bool,
    /// Model probability as a percentage
    pub cloudburst_chance: Option<f64>,
    pub location: String,
    pub fetched_at: DateTime<Utc>,
    pub current_weather: CurrentWeather,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_locations: Option<Vec<SafeCandidate>>,
}

/// Model inputs supplied directly instead of fetched from the weather provider
#[derive(Debug, Default, Deserialize)]
pub struct ConditionsRequest {
    pub precipitation: Option<f64>,
    pub cloud_cover_mean: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub apparent_temperature: Option<f64>,
}

impl ConditionsRequest {
    pub fn into_snapshot(self) -> Result<WeatherSnapshot, CloudburstError> {
        let require = |key: &str, value: Option<f64>| {
            value.ok_or_else(|| CloudburstError::validation(format!("Missing key: {key}")))
        };
        let apparent_temperature = require("apparent_temperature", self.apparent_temperature)?;

        Ok(WeatherSnapshot {
            precipitation_mm_per_h: require("precipitation", self.precipitation)?,
            temperature_c: apparent_temperature,
            apparent_temperature_c: apparent_temperature,
            cloud_cover_pct: require("cloud_cover_mean", self.cloud_cover_mean)?,
            wind_speed_mps: require("wind_speed", self.wind_speed)?,
            humidity_pct: require("relative_humidity", self.relative_humidity)?,
            pressure_hpa: 0.0,
            description: "Supplied conditions".to_string(),
            resolved_place_name: UNKNOWN_LOCATION.to_string(),
            resolved_coordinate: None,
            fetched_at: Utc::now(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ChanceResponse {
    pub prediction: u8,
    /// Model probability as a percentage
    pub cloudburst_chance: Option<f64>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", get(predict).post(predict_conditions))
        .route("/signup", post(signup))
        .with_state(state)
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({ "message": "Cloudburst Prediction API is running" }))
}

async fn predict(
    State(state): State<AppState>,
    Query(query): Query<PredictQuery>,
) -> Result<Json<PredictResponse>, ApiError> {
    let target = query.target()?;
    let weather = state.probe.fetch(&target).await?;

    let prediction = state.classifier.classify(&weather);
    let assessment = RiskAssessment::from_prediction(prediction, &weather);

    let origin = match target {
        ProbeTarget::Coordinates(c) => Some(c),
        ProbeTarget::City(_) => weather.resolved_coordinate,
    };

    let safe_locations = match (assessment.is_risk, origin) {
        (true, Some(origin)) => {
            info!("Risk detected at {}, searching safe zones", origin.format_coordinates());
            Some(state.search.find_safe_zones(&origin, &state.params).await)
        }
        (true, None) => {
            warn!(
                "Risk detected for {} but no coordinate to search from",
                weather.resolved_place_name
            );
            None
        }
        _ => None,
    };

    Ok(Json(PredictResponse {
        prediction: u8::from(prediction.is_risk),
        alert: assessment.is_risk,
        cloudburst_chance: assessment.chance_percent(),
        location: weather.resolved_place_name.clone(),
        fetched_at: weather.fetched_at,
        current_weather: CurrentWeather::from(&weather),
        safe_locations,
    }))
}

async fn predict_conditions(
    State(state): State<AppState>,
    payload: Result<Json<ConditionsRequest>, JsonRejection>,
) -> Result<Json<ChanceResponse>, ApiError> {
    let Json(conditions) = payload.map_err(invalid_body)?;
    let snapshot = conditions.into_snapshot()?;
    let prediction = state.classifier.classify(&snapshot);

    Ok(Json(ChanceResponse {
        prediction: u8::from(prediction.is_risk),
        cloudburst_chance: prediction.probability.map(|p| p * 100.0),
    }))
}

fn invalid_body(rejection: JsonRejection) -> CloudburstError {
    CloudburstError::validation(format!("invalid JSON body: {}", rejection.body_text()))
}

async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let Json(new_user) = payload.map_err(invalid_body)?;
    let user = new_user.validate()?;
    let record = state.users.create(user).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User signed up successfully",
            "username": record.username,
            "email": record.email,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::classifier::Prediction;
    use crate::models::weather::tests::snapshot;
    use crate::places::{PlaceFinder, PlaceLookup};
    use crate::users::SqliteUserDirectory;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    /// Fixed rainfall everywhere except grid points, which are calm and uniquely named
    struct FixedProbe {
        precipitation: f64,
    }

    #[async_trait]
    impl WeatherProbe for FixedProbe {
        async fn fetch(&self, target: &ProbeTarget) -> Result<WeatherSnapshot> {
            match target {
                ProbeTarget::City(name) if name == "Atlantis" => {
                    Err(CloudburstError::upstream("city not found"))
                }
                ProbeTarget::City(name) => {
                    let mut w = snapshot(name, self.precipitation);
                    if name != "Lost Valley" {
                        w.resolved_coordinate = Some(Coordinate {
                            latitude: 19.0,
                            longitude: 72.8,
                        });
                    }
                    Ok(w)
                }
                ProbeTarget::Coordinates(c) if c.latitude == 19.0 && c.longitude == 72.8 => {
                    Ok(snapshot("Mumbai", self.precipitation))
                }
                ProbeTarget::Coordinates(c) => Ok(snapshot(
                    &format!("Zone {:.2},{:.2}", c.latitude, c.longitude),
                    1.0,
                )),
            }
        }
    }

    struct NeverRisk;

    impl RiskClassifier for NeverRisk {
        fn classify(&self, _snapshot: &WeatherSnapshot) -> Prediction {
            Prediction {
                is_risk: false,
                probability: Some(0.1),
            }
        }
    }

    struct NoPlaces;

    #[async_trait]
    impl PlaceFinder for NoPlaces {
        async fn nearby(&self, _c: &Coordinate, _r: u32, _l: usize) -> PlaceLookup {
            PlaceLookup::found(vec![])
        }
    }

    async fn app(precipitation: f64) -> Router {
        let probe: Arc<dyn WeatherProbe> = Arc::new(FixedProbe { precipitation });
        let classifier: Arc<dyn RiskClassifier> = Arc::new(NeverRisk);
        let search = SafeZoneSearch::new(probe.clone(), classifier.clone(), Arc::new(NoPlaces));
        let users = Arc::new(SqliteUserDirectory::in_memory().await.unwrap());
        router(AppState {
            probe,
            classifier,
            search,
            users,
            params: SearchParams::default(),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn json_request(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_index() {
        let response = get(app(0.0).await, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Cloudburst Prediction API is running");
    }

    #[tokio::test]
    async fn test_predict_calm_weather() {
        let response = get(app(2.0).await, "/predict?lat=19.0&lon=72.8").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["prediction"], 0);
        assert_eq!(body["alert"], false);
        assert_eq!(body["location"], "Mumbai");
        assert_eq!(body["current_weather"]["precipitation"], 2.0);
        assert!((body["cloudburst_chance"].as_f64().unwrap() - 10.0).abs() < 1e-9);
        assert!(body.get("safe_locations").is_none());
    }

    #[tokio::test]
    async fn test_predict_heavy_rain_attaches_safe_locations() {
        let response = get(app(12.0).await, "/predict?lat=19.0&lon=72.8").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["prediction"], 0);
        assert_eq!(body["alert"], true);
        let zones = body["safe_locations"].as_array().unwrap();
        assert_eq!(zones.len(), 5);
        let distance = |i: usize| zones[i]["distance_km"].as_f64().unwrap();
        assert!(distance(0) <= distance(4));
    }

    #[tokio::test]
    async fn test_predict_by_city_uses_resolved_coordinate() {
        let response = get(app(15.0).await, "/predict?city=Navi%20Mumbai").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["location"], "Navi Mumbai");
        assert!(!body["safe_locations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_predict_missing_parameters() {
        for uri in [
            "/predict",
            "/predict?lat=19.0",
            "/predict?lon=72.8",
            "/predict?city=%20",
        ] {
            let response = get(app(0.0).await, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body = body_json(response).await;
            assert!(body["message"].as_str().unwrap().contains("required"));
        }
    }

    #[tokio::test]
    async fn test_predict_invalid_coordinates() {
        for uri in [
            "/predict?lat=abc&lon=72.8",
            "/predict?lat=91&lon=72.8",
            "/predict?lat=19&lon=-181",
        ] {
            let response = get(app(0.0).await, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_predict_upstream_failure_is_bad_gateway() {
        let response = get(app(0.0).await, "/predict?city=Atlantis").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_signup_flow() {
        let app = app(0.0).await;
        let payload = r#"{"username": "Asha", "email": "asha@example.com", "city": "Mumbai",
            "address": "Linking Road", "latitude": 19.07, "longitude": 72.87}"#;

        let response = app.clone().oneshot(json_request("/signup", payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.clone().oneshot(json_request("/signup", payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["message"], "Email already exists!");
    }

    #[tokio::test]
    async fn test_signup_rejects_incomplete_payloads() {
        let app = app(0.0).await;
        for payload in [
            r#"{"username": "Asha", "email": "asha@example.com"}"#,
            r#"{"username": " ", "email": "asha@example.com", "city": "Mumbai", "address": "x", "latitude": 19.0, "longitude": 72.0}"#,
            r#"{"username": "Asha", "email": "asha@example.com", "city": "Mumbai", "address": "x", "latitude": 95.0, "longitude": 72.0}"#,
            "not json",
        ] {
            let response = app.clone().oneshot(json_request("/signup", payload)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{payload}");
        }
    }

    #[tokio::test]
    async fn test_city_with_heavy_rain_but_no_coordinate_still_alerts() {
        let app = app(12.0).await;
        let response = get(app, "/predict?city=Lost%20Valley").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["prediction"], 0);
        assert_eq!(body["alert"], true);
        assert!(body.get("safe_locations").is_none());
    }

    #[tokio::test]
    async fn test_predict_from_supplied_conditions() {
        let payload = r#"{"precipitation": 3.5, "cloud_cover_mean": 80, "relative_humidity": 90,
            "wind_speed": 6.0, "apparent_temperature": 27.0}"#;
        let response = app(0.0)
            .await
            .oneshot(json_request("/predict", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["prediction"], 0);
        assert!((body["cloudburst_chance"].as_f64().unwrap() - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_supplied_conditions_missing_key() {
        let payload = r#"{"precipitation": 3.5, "cloud_cover_mean": 80, "relative_humidity": 90,
            "apparent_temperature": 27.0}"#;
        let response = app(0.0)
            .await
            .oneshot(json_request("/predict", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("Missing key: wind_speed"));
    }

    #[test]
    fn test_conditions_map_onto_snapshot() {
        let snapshot = ConditionsRequest {
            precipitation: Some(12.0),
            cloud_cover_mean: Some(95.0),
            relative_humidity: Some(88.0),
            wind_speed: Some(7.5),
            apparent_temperature: Some(31.0),
        }
        .into_snapshot()
        .unwrap();
        assert_eq!(snapshot.precipitation_mm_per_h, 12.0);
        assert_eq!(snapshot.cloud_cover_pct, 95.0);
        assert_eq!(snapshot.humidity_pct, 88.0);
        assert_eq!(snapshot.wind_speed_mps, 7.5);
        assert_eq!(snapshot.apparent_temperature_c, 31.0);

        let err = ConditionsRequest::default().into_snapshot().unwrap_err();
        assert!(err.to_string().contains("Missing key: apparent_temperature"));
    }
}
