//! Geographic coordinate model

use serde::{Deserialize, Serialize};

use crate::{CloudburstError, Result};

/// A point on the globe in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Latitude in decimal degrees, -90..=90
    pub latitude: f64,
    /// Longitude in decimal degrees, -180..=180
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting values outside the valid ranges
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coordinate = Self {
            latitude,
            longitude,
        };
        if coordinate.is_valid() {
            Ok(coordinate)
        } else {
            Err(CloudburstError::validation(format!(
                "coordinates out of range: lat={latitude}, lon={longitude}"
            )))
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Shift by the given number of degrees without range checks
    #[must_use]
    pub fn offset(&self, d_lat: f64, d_lon: f64) -> Self {
        Self {
            latitude: self.latitude + d_lat,
            longitude: self.longitude + d_lon,
        }
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0, true)]
    #[case(90.0, 180.0, true)]
    #[case(-90.0, -180.0, true)]
    #[case(90.5, 0.0, false)]
    #[case(0.0, -180.01, false)]
    #[case(f64::NAN, 0.0, false)]
    fn test_coordinate_validation(#[case] lat: f64, #[case] lon: f64, #[case] valid: bool) {
        assert_eq!(Coordinate::new(lat, lon).is_ok(), valid);
    }

    #[test]
    fn test_format_coordinates() {
        let mumbai = Coordinate::new(19.076, 72.8777).unwrap();
        assert_eq!(mumbai.format_coordinates(), "(19.0760, 72.8777)");
    }

    #[test]
    fn test_offset() {
        let origin = Coordinate::new(10.0, 20.0).unwrap();
        let shifted = origin.offset(-0.05, 0.1);
        assert!((shifted.latitude - 9.95).abs() < 1e-12);
        assert!((shifted.longitude - 20.1).abs() < 1e-12);
    }
}
