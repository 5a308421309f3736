//! Cloudburst risk classification
//!
//! The classifier itself is a black box behind [`RiskClassifier`]; this module
//! ships a logistic model over the five weather features the risk model was
//! trained on, loaded once at startup and shared read-only.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::WeatherSnapshot;
use crate::{CloudburstError, Result};

/// Rainfall at or above this many mm/h is always treated as a cloudburst risk
pub const ALERT_PRECIPITATION_MM: f64 = 10.0;

/// Raw model output before policy is applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub is_risk: bool,
    pub probability: Option<f64>,
}

/// Final risk decision for one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub is_risk: bool,
    pub precipitation: f64,
    /// Model probability of a cloudburst, 0.0-1.0, when the model provides one
    pub probability: Option<f64>,
}

impl RiskAssessment {
    /// Combine a model prediction with the precipitation override.
    ///
    /// Either signal alone is enough to flag risk.
    #[must_use]
    pub fn from_prediction(prediction: Prediction, snapshot: &WeatherSnapshot) -> Self {
        let precipitation = snapshot.precipitation_mm_per_h;
        Self {
            is_risk: prediction.is_risk || precipitation >= ALERT_PRECIPITATION_MM,
            precipitation,
            probability: prediction.probability,
        }
    }

    /// Probability as a percentage, for display
    #[must_use]
    pub fn chance_percent(&self) -> Option<f64> {
        self.probability.map(|p| p * 100.0)
    }
}

/// Maps a weather snapshot to a cloudburst prediction
pub trait RiskClassifier: Send + Sync {
    fn classify(&self, snapshot: &WeatherSnapshot) -> Prediction;

    /// Prediction with the precipitation override applied
    fn predict(&self, snapshot: &WeatherSnapshot) -> RiskAssessment {
        RiskAssessment::from_prediction(self.classify(snapshot), snapshot)
    }
}

/// Per-feature weights of the logistic model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    pub precipitation: f64,
    pub apparent_temperature: f64,
    pub cloud_cover: f64,
    pub wind_speed: f64,
    pub humidity: f64,
}

/// Logistic regression over current conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRiskModel {
    pub intercept: f64,
    pub weights: FeatureWeights,
    #[serde(default = "default_threshold")]
    pub decision_threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

impl Default for LogisticRiskModel {
    fn default() -> Self {
        Self {
            intercept: -9.0,
            weights: FeatureWeights {
                precipitation: 0.45,
                apparent_temperature: 0.02,
                cloud_cover: 0.03,
                wind_speed: 0.05,
                humidity: 0.04,
            },
            decision_threshold: default_threshold(),
        }
    }
}

impl LogisticRiskModel {
    /// Load model coefficients from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CloudburstError::config(format!("Cannot read model file {}: {e}", path.display()))
        })?;
        let model: Self = serde_json::from_str(&raw).map_err(|e| {
            CloudburstError::config(format!("Invalid model file {}: {e}", path.display()))
        })?;
        if !(model.decision_threshold > 0.0 && model.decision_threshold < 1.0) {
            return Err(CloudburstError::config(
                "Model decision threshold must be between 0 and 1",
            ));
        }
        info!("Loaded risk model from {}", path.display());
        Ok(model)
    }

    /// Model from the configured file, or the built-in coefficients
    pub fn load(model_path: Option<&str>, decision_threshold: f64) -> Result<Self> {
        match model_path {
            Some(path) => Self::from_path(path),
            None => {
                info!("No model file configured, using built-in coefficients");
                Ok(Self {
                    decision_threshold,
                    ..Self::default()
                })
            }
        }
    }

    /// Probability of a cloudburst for the given conditions
    #[must_use]
    pub fn probability(&self, snapshot: &WeatherSnapshot) -> f64 {
        let w = &self.weights;
        let z = self.intercept
            + w.precipitation * snapshot.precipitation_mm_per_h
            + w.apparent_temperature * snapshot.apparent_temperature_c
            + w.cloud_cover * snapshot.cloud_cover_pct
            + w.wind_speed * snapshot.wind_speed_mps
            + w.humidity * snapshot.humidity_pct;
        1.0 / (1.0 + (-z).exp())
    }
}

impl RiskClassifier for LogisticRiskModel {
    fn classify(&self, snapshot: &WeatherSnapshot) -> Prediction {
        let probability = self.probability(snapshot);
        Prediction {
            is_risk: probability >= self.decision_threshold,
            probability: Some(probability),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::weather::tests::snapshot;
    use std::io::Write;

    struct NeverRisk;

    impl RiskClassifier for NeverRisk {
        fn classify(&self, _snapshot: &WeatherSnapshot) -> Prediction {
            Prediction {
                is_risk: false,
                probability: None,
            }
        }
    }

    #[test]
    fn test_precipitation_overrides_classifier() {
        let assessment = NeverRisk.predict(&snapshot("Thane", 11.0));
        assert!(assessment.is_risk);
        assert_eq!(assessment.precipitation, 11.0);

        let assessment = NeverRisk.predict(&snapshot("Thane", 10.0));
        assert!(assessment.is_risk);

        let assessment = NeverRisk.predict(&snapshot("Thane", 9.99));
        assert!(!assessment.is_risk);
    }

    #[test]
    fn test_default_model_separates_calm_and_storm() {
        let model = LogisticRiskModel::default();

        let mut calm = snapshot("Pune", 0.0);
        calm.cloud_cover_pct = 20.0;
        calm.humidity_pct = 50.0;
        let calm_assessment = model.predict(&calm);
        assert!(!calm_assessment.is_risk);
        assert!(calm_assessment.probability.unwrap() < 0.05);

        let mut storm = snapshot("Mumbai", 8.0);
        storm.cloud_cover_pct = 100.0;
        storm.humidity_pct = 96.0;
        storm.wind_speed_mps = 12.0;
        let storm_assessment = model.predict(&storm);
        assert!(storm_assessment.is_risk);
        assert!(storm_assessment.chance_percent().unwrap() > 50.0);
    }

    #[test]
    fn test_load_model_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"intercept": 0.0, "weights": {{"precipitation": 1.0, "apparent_temperature": 0.0, "cloud_cover": 0.0, "wind_speed": 0.0, "humidity": 0.0}}}}"#
        )
        .unwrap();

        let model = LogisticRiskModel::from_path(file.path()).unwrap();
        assert_eq!(model.decision_threshold, 0.5);
        assert!((model.probability(&snapshot("X", 0.0)) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = LogisticRiskModel::load(Some("/nonexistent/model.json"), 0.5).unwrap_err();
        assert!(matches!(err, CloudburstError::Config { .. }));
    }

    #[test]
    fn test_load_without_path_uses_threshold() {
        let model = LogisticRiskModel::load(None, 0.7).unwrap();
        assert_eq!(model.decision_threshold, 0.7);
    }
}
