//! Safe-zone grid search
//!
//! Samples a square lattice of points around an origin, keeps the ones whose
//! current weather is comfortably calm, collapses points that resolve to the
//! same named place, and returns the nearest few enriched with amenities.

use std::collections::HashSet;
use std::sync::Arc;

use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::RiskClassifier;
use crate::config::{PlacesConfig, SearchConfig};
use crate::geo::distance_km;
use crate::models::{Coordinate, PlaceInfo, WeatherSnapshot};
use crate::places::PlaceFinder;
use crate::weather::{ProbeTarget, WeatherProbe};

/// A candidate only qualifies as safe below this rainfall (mm/h)
pub const SAFE_PRECIPITATION_MM: f64 = 5.0;

/// Tunables for one search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub radius_km: f64,
    pub grid_step_deg: f64,
    pub grid_half_width: u32,
    pub max_results: usize,
    /// Amenity search radius around each result, in meters
    pub places_radius_m: u32,
    pub places_limit: usize,
    /// Weather lookups allowed in flight at once
    pub concurrency: usize,
    /// Amenity lookups allowed in flight at once
    pub places_concurrency: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default(), &PlacesConfig::default())
    }
}

impl SearchParams {
    #[must_use]
    pub fn from_config(search: &SearchConfig, places: &PlacesConfig) -> Self {
        Self {
            radius_km: search.radius_km,
            grid_step_deg: search.grid_step_deg,
            grid_half_width: search.grid_half_width,
            max_results: search.max_results,
            places_radius_m: places.radius_m,
            places_limit: places.limit,
            concurrency: search.concurrency,
            places_concurrency: places.concurrency,
        }
    }
}

/// A nearby point with acceptable weather
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeCandidate {
    pub coordinate: Coordinate,
    pub place_name: String,
    pub distance_km: f64,
    pub weather: WeatherSnapshot,
    pub nearby_places: Vec<PlaceInfo>,
}

/// What a sweep produced, including how many grid points could not be checked
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub candidates: Vec<SafeCandidate>,
    /// Grid points whose weather was requested
    pub evaluated: usize,
    /// Grid points whose weather request failed
    pub failed: usize,
}

impl SearchOutcome {
    /// True when nothing could be checked at all, as opposed to "nothing safe"
    #[must_use]
    pub fn search_failed(&self) -> bool {
        self.evaluated > 0 && self.failed == self.evaluated
    }

    #[must_use]
    pub fn into_candidates(self) -> Vec<SafeCandidate> {
        self.candidates
    }
}

/// Lattice points around `origin` in latitude-major scan order, origin excluded
#[must_use]
pub fn grid_points(origin: &Coordinate, step_deg: f64, half_width: u32) -> Vec<Coordinate> {
    let half = i64::from(half_width);
    let mut points = Vec::new();
    for lat_step in -half..=half {
        for lon_step in -half..=half {
            if lat_step == 0 && lon_step == 0 {
                continue;
            }
            let point = origin.offset(lat_step as f64 * step_deg, lon_step as f64 * step_deg);
            if point.is_valid() {
                points.push(point);
            }
        }
    }
    points
}

/// Grid search over injected weather, risk and place collaborators
#[derive(Clone)]
pub struct SafeZoneSearch {
    probe: Arc<dyn WeatherProbe>,
    classifier: Arc<dyn RiskClassifier>,
    places: Arc<dyn PlaceFinder>,
}

impl SafeZoneSearch {
    pub fn new(
        probe: Arc<dyn WeatherProbe>,
        classifier: Arc<dyn RiskClassifier>,
        places: Arc<dyn PlaceFinder>,
    ) -> Self {
        Self {
            probe,
            classifier,
            places,
        }
    }

    /// Safe zones ranked nearest-first; empty when none were found or the sweep failed
    pub async fn find_safe_zones(
        &self,
        origin: &Coordinate,
        params: &SearchParams,
    ) -> Vec<SafeCandidate> {
        self.search(origin, params).await.into_candidates()
    }

    pub async fn search(&self, origin: &Coordinate, params: &SearchParams) -> SearchOutcome {
        if params.max_results == 0 {
            return SearchOutcome::default();
        }

        let in_range: Vec<(Coordinate, f64)> =
            grid_points(origin, params.grid_step_deg, params.grid_half_width)
                .into_iter()
                .map(|point| (point, distance_km(origin, &point)))
                .filter(|(_, distance)| *distance <= params.radius_km)
                .collect();

        debug!(
            "Checking {} grid points within {}km of {}",
            in_range.len(),
            params.radius_km,
            origin.format_coordinates()
        );

        // `buffered` keeps results in scan order regardless of completion order
        let probe = &self.probe;
        let fetched: Vec<_> = stream::iter(in_range)
            .map(|(point, distance)| async move {
                let result = probe.fetch(&ProbeTarget::Coordinates(point)).await;
                (point, distance, result)
            })
            .buffered(params.concurrency.max(1))
            .collect()
            .await;

        let mut outcome = SearchOutcome {
            evaluated: fetched.len(),
            ..SearchOutcome::default()
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut accepted = Vec::new();

        for (point, distance, result) in fetched {
            let weather = match result {
                Ok(weather) => weather,
                Err(e) => {
                    warn!("Error checking location {}: {}", point.format_coordinates(), e);
                    outcome.failed += 1;
                    continue;
                }
            };

            let risk = self.classifier.predict(&weather);
            if risk.is_risk || weather.precipitation_mm_per_h >= SAFE_PRECIPITATION_MM {
                continue;
            }
            if !weather.has_known_place() || seen.contains(&weather.resolved_place_name) {
                continue;
            }

            seen.insert(weather.resolved_place_name.clone());
            accepted.push(SafeCandidate {
                coordinate: point,
                place_name: weather.resolved_place_name.clone(),
                distance_km: distance,
                weather,
                nearby_places: Vec::new(),
            });
        }

        accepted.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        accepted.truncate(params.max_results);

        // the public Overpass instance throttles parallel clients per IP
        let places = &self.places;
        let coordinates: Vec<Coordinate> = accepted.iter().map(|c| c.coordinate).collect();
        let lookups: Vec<_> = stream::iter(coordinates)
            .map(|coordinate| async move {
                places
                    .nearby(&coordinate, params.places_radius_m, params.places_limit)
                    .await
            })
            .buffered(params.places_concurrency.max(1))
            .collect()
            .await;

        for (candidate, lookup) in accepted.iter_mut().zip(lookups) {
            if let Some(warning) = lookup.warning {
                warn!("No amenities for {}: {}", candidate.place_name, warning);
            }
            candidate.nearby_places = lookup.places;
        }

        if outcome.search_failed() {
            warn!(
                "Safe-zone search around {} failed: all {} weather lookups errored",
                origin.format_coordinates(),
                outcome.failed
            );
        } else {
            info!(
                "Found {} safe zones around {} ({} of {} lookups failed)",
                accepted.len(),
                origin.format_coordinates(),
                outcome.failed,
                outcome.evaluated
            );
        }

        outcome.candidates = accepted;
        outcome
    }
}
