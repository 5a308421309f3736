//! Nearby safe amenities from OpenStreetMap via the Overpass API
//!
//! Enrichment is best-effort: lookups never fail, they return an empty list
//! together with a warning the caller can log.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::PlacesConfig;
use crate::models::{Coordinate, PlaceInfo};
use crate::{CloudburstError, Result, VERSION};

/// Amenity tags treated as places people can shelter in or get help from
pub const SAFE_AMENITIES: [&str; 7] = [
    "school",
    "college",
    "university",
    "hospital",
    "community_centre",
    "police",
    "fire_station",
];

/// Result of a best-effort lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceLookup {
    pub places: Vec<PlaceInfo>,
    /// Set when the lookup failed and `places` is empty because of it
    pub warning: Option<String>,
}

impl PlaceLookup {
    #[must_use]
    pub fn found(places: Vec<PlaceInfo>) -> Self {
        Self {
            places,
            warning: None,
        }
    }

    #[must_use]
    pub fn failed(warning: impl Into<String>) -> Self {
        Self {
            places: Vec::new(),
            warning: Some(warning.into()),
        }
    }
}

#[async_trait]
pub trait PlaceFinder: Send + Sync {
    async fn nearby(&self, coordinate: &Coordinate, radius_m: u32, limit: usize) -> PlaceLookup;
}

/// Overpass API client
pub struct OverpassClient {
    client: Client,
    base_url: String,
}

impl OverpassClient {
    pub fn new(config: &PlacesConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("cloudburst/{VERSION}"))
            .build()
            .map_err(|e| CloudburstError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    async fn query(
        &self,
        coordinate: &Coordinate,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<PlaceInfo>> {
        let query = build_query(coordinate, radius_m);

        let response = self
            .client
            .post(&self.base_url)
            .form(&[("data", query)])
            .send()
            .await
            .map_err(|e| CloudburstError::upstream(format!("Overpass request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CloudburstError::upstream(format!(
                "Overpass API returned {status}"
            )));
        }

        let body: OverpassResponse = response
            .json()
            .await
            .map_err(|e| CloudburstError::malformed(format!("Invalid Overpass response: {e}")))?;

        Ok(places_from_elements(body.elements, limit))
    }
}

#[async_trait]
impl PlaceFinder for OverpassClient {
    #[instrument(skip(self), fields(lat = coordinate.latitude, lon = coordinate.longitude))]
    async fn nearby(&self, coordinate: &Coordinate, radius_m: u32, limit: usize) -> PlaceLookup {
        match self.query(coordinate, radius_m, limit).await {
            Ok(places) => {
                debug!("Found {} amenities within {}m", places.len(), radius_m);
                PlaceLookup::found(places)
            }
            Err(e) => {
                warn!("Error fetching nearby places: {}", e);
                PlaceLookup::failed(e.to_string())
            }
        }
    }
}

/// Overpass QL selecting safe amenities around a point
#[must_use]
pub fn build_query(coordinate: &Coordinate, radius_m: u32) -> String {
    let amenities = SAFE_AMENITIES.join("|");
    let around = format!(
        "around:{},{},{}",
        radius_m, coordinate.latitude, coordinate.longitude
    );
    format!(
        "[out:json][timeout:25];\n(\n  way({around})[\"amenity\"~\"{amenities}\"];\n  node({around})[\"amenity\"~\"{amenities}\"];\n);\nout body;\n>;\nout skel qt;"
    )
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    tags: Option<HashMap<String, String>>,
}

fn tag<'a>(tags: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    tags.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Address fragments from whichever `addr:*` tags are present
#[must_use]
pub fn address_parts(tags: &HashMap<String, String>) -> Vec<String> {
    let mut parts = Vec::new();
    match (tag(tags, "addr:housenumber"), tag(tags, "addr:street")) {
        (Some(number), Some(street)) => parts.push(format!("{number}, {street}")),
        (None, Some(street)) => parts.push(street.to_string()),
        _ => {}
    }
    for key in ["addr:district", "addr:city", "addr:postcode"] {
        if let Some(value) = tag(tags, key) {
            parts.push(value.to_string());
        }
    }
    parts
}

fn places_from_elements(elements: Vec<OverpassElement>, limit: usize) -> Vec<PlaceInfo> {
    elements
        .into_iter()
        .filter_map(|element| {
            let tags = element.tags?;
            let name = tag(&tags, "name")?.to_string();
            let category = tag(&tags, "amenity").unwrap_or("amenity").to_string();
            let coordinate = match (element.lat, element.lon) {
                (Some(latitude), Some(longitude)) => Some(Coordinate {
                    latitude,
                    longitude,
                }),
                _ => None,
            };
            Some(PlaceInfo {
                name,
                category,
                address_parts: address_parts(&tags),
                phone: tag(&tags, "phone").map(str::to_string),
                coordinate,
            })
        })
        .take(limit)
        .collect()
}
