//! Registered alert recipients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Coordinate;
use crate::{CloudburstError, Result};

/// A user stored in the directory
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub city: String,
    pub address: String,
    pub home_coordinate: Coordinate,
    pub created_at: DateTime<Utc>,
}

/// Signup payload before it is persisted
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct NewUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A signup that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUser {
    pub username: String,
    pub email: String,
    pub city: String,
    pub address: String,
    pub home_coordinate: Coordinate,
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CloudburstError::validation(format!("{field} is required"))),
    }
}

impl NewUser {
    /// Check that every field is present and the coordinate is in range
    pub fn validate(self) -> Result<ValidatedUser> {
        let username = required("username", self.username)?;
        let email = required("email", self.email)?;
        if !email.contains('@') {
            return Err(CloudburstError::validation("email address is not valid"));
        }
        let city = required("city", self.city)?;
        let address = required("address", self.address)?;
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(CloudburstError::validation(
                "latitude and longitude are required",
            ));
        };
        let home_coordinate = Coordinate::new(latitude, longitude)?;

        Ok(ValidatedUser {
            username,
            email,
            city,
            address,
            home_coordinate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> NewUser {
        NewUser {
            username: Some("asha".to_string()),
            email: Some("asha@example.com".to_string()),
            city: Some("Mumbai".to_string()),
            address: Some("Linking Road".to_string()),
            latitude: Some(19.07),
            longitude: Some(72.87),
        }
    }

    #[test]
    fn test_validate_complete_signup() {
        let user = complete().validate().unwrap();
        assert_eq!(user.username, "asha");
        assert_eq!(user.home_coordinate.latitude, 19.07);
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let mut user = complete();
        user.city = Some("   ".to_string());
        let err = user.validate().unwrap_err();
        assert!(err.to_string().contains("city is required"));
    }

    #[test]
    fn test_validate_rejects_missing_coordinates() {
        let mut user = complete();
        user.longitude = None;
        assert!(matches!(
            user.validate(),
            Err(CloudburstError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut user = complete();
        user.latitude = Some(120.0);
        assert!(user.validate().is_err());
    }
}
