//! Points of interest near a safe zone

use serde::{Deserialize, Serialize};

use super::Coordinate;

/// A named amenity returned by the map service
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlaceInfo {
    pub name: String,
    /// Amenity tag, e.g. "hospital"
    pub category: String,
    /// Address fragments in display order; absent fields are omitted
    pub address_parts: Vec<String>,
    pub phone: Option<String>,
    pub coordinate: Option<Coordinate>,
}

impl PlaceInfo {
    #[must_use]
    pub fn address(&self) -> Option<String> {
        if self.address_parts.is_empty() {
            None
        } else {
            Some(self.address_parts.join(", "))
        }
    }

    /// Multi-line description used in alert emails
    #[must_use]
    pub fn describe(&self, indent: &str) -> String {
        let mut text = format!("{indent}- {} ({})", self.name, self.category);
        if let Some(address) = self.address() {
            text.push_str(&format!("\n{indent}    Address: {address}"));
        }
        if let Some(phone) = &self.phone {
            text.push_str(&format!("\n{indent}    Phone: {phone}"));
        }
        if let Some(coordinate) = &self.coordinate {
            text.push_str(&format!(
                "\n{indent}    Coordinates: ({:.6}, {:.6})",
                coordinate.latitude, coordinate.longitude
            ));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_skips_missing_fields() {
        let place = PlaceInfo {
            name: "City Hospital".to_string(),
            category: "hospital".to_string(),
            address_parts: vec![],
            phone: None,
            coordinate: None,
        };
        assert_eq!(place.describe(""), "- City Hospital (hospital)");
    }

    #[test]
    fn test_describe_full() {
        let place = PlaceInfo {
            name: "Fire Station 4".to_string(),
            category: "fire_station".to_string(),
            address_parts: vec!["12, MG Road".to_string(), "Pune".to_string()],
            phone: Some("+91 20 1234".to_string()),
            coordinate: Some(Coordinate {
                latitude: 18.5,
                longitude: 73.85,
            }),
        };
        let text = place.describe("  ");
        assert!(text.contains("Address: 12, MG Road, Pune"));
        assert!(text.contains("Phone: +91 20 1234"));
        assert!(text.contains("Coordinates: (18.500000, 73.850000)"));
    }
}
