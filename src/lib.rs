//! Cloudburst - cloudburst risk alerts with nearby safe-zone suggestions
//!
//! This library provides current-weather probing, risk classification,
//! the safe-zone grid search, the periodic alert pipeline, and the HTTP API.

pub mod alert;
pub mod api;
pub mod classifier;
pub mod config;
pub mod email;
pub mod error;
pub mod geo;
pub mod logging;
pub mod models;
pub mod places;
pub mod safe_zones;
pub mod users;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use alert::{AlertPipeline, PassReport};
pub use classifier::{LogisticRiskModel, RiskAssessment, RiskClassifier};
pub use config::AppConfig;
pub use email::{Mailer, SmtpMailer};
pub use error::CloudburstError;
pub use geo::distance_km;
pub use models::{Coordinate, PlaceInfo, UserRecord, WeatherSnapshot};
pub use places::{OverpassClient, PlaceFinder};
pub use safe_zones::{SafeCandidate, SafeZoneSearch, SearchParams};
pub use users::{SqliteUserDirectory, UserDirectory};
pub use weather::{OpenWeatherClient, ProbeTarget, WeatherProbe};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, CloudburstError>;
