//! Alert email composition

use std::fmt::Write;

use crate::models::{UserRecord, WeatherSnapshot};
use crate::safe_zones::SafeCandidate;

pub const ALERT_SUBJECT: &str = "CLOUDBURST ALERT - Safe Locations Available";

/// Helplines appended to every alert
pub const EMERGENCY_CONTACTS: [(&str, &str); 4] = [
    ("National Emergency", "112"),
    ("NDMA Helpline", "1078"),
    ("Police", "100"),
    ("BMC Disaster Helpline", "1916"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

/// Numbered list of safe zones with their amenities and conditions
#[must_use]
pub fn format_safe_zones(zones: &[SafeCandidate]) -> String {
    if zones.is_empty() {
        return "No safe locations found in your vicinity.".to_string();
    }

    let mut text = String::from("Safe Locations Nearby:\n");
    for (idx, zone) in zones.iter().enumerate() {
        let _ = writeln!(text, "\n{}. {}", idx + 1, zone.place_name);
        let _ = writeln!(text, "   Coordinates: {}", zone.coordinate.format_coordinates());
        let _ = writeln!(text, "   Distance: {:.2} km", zone.distance_km);

        if !zone.nearby_places.is_empty() {
            text.push_str("   Nearby Safe Places:\n");
            for place in &zone.nearby_places {
                let _ = writeln!(text, "{}", place.describe("   "));
            }
        }

        text.push_str("   Weather Conditions:\n");
        for line in zone.weather.condition_lines("   ") {
            let _ = writeln!(text, "{line}");
        }
    }
    text
}

/// Full alert for one user
#[must_use]
pub fn compose_alert(
    user: &UserRecord,
    weather: &WeatherSnapshot,
    zones: &[SafeCandidate],
) -> AlertMessage {
    let mut body = String::new();
    let _ = writeln!(body, "Dear {},\n", user.username);
    let _ = writeln!(body, "CLOUDBURST ALERT for your location:");
    let _ = writeln!(body, "Location: {}, {}\n", user.address, user.city);
    body.push_str("IMPORTANT SAFETY ADVISORY\n");
    body.push_str(
        "Please stay alert and take necessary precautions. Avoid flood-prone areas and stay indoors if possible.\n\n",
    );

    body.push_str("Current Weather Conditions:\n");
    for line in weather.condition_lines("") {
        let _ = writeln!(body, "{line}");
    }

    let _ = writeln!(body, "\n{}", format_safe_zones(zones));
    if !zones.is_empty() {
        body.push_str("Please move to one of these safe locations immediately if needed.\n\n");
    }

    body.push_str("Emergency Helpline Numbers:\n");
    for (name, number) in EMERGENCY_CONTACTS {
        let _ = writeln!(body, "- {name}: {number}");
    }
    body.push_str("\nStay safe and follow official updates.\n\nBest regards,\nCloudburst Alert System");

    AlertMessage {
        subject: ALERT_SUBJECT.to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::weather::tests::snapshot;
    use crate::models::{Coordinate, PlaceInfo};
    use chrono::Utc;

    fn user() -> UserRecord {
        UserRecord {
            username: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            city: "Mumbai".to_string(),
            address: "Linking Road".to_string(),
            home_coordinate: Coordinate {
                latitude: 19.07,
                longitude: 72.87,
            },
            created_at: Utc::now(),
        }
    }

    fn zone(name: &str, distance_km: f64) -> SafeCandidate {
        SafeCandidate {
            coordinate: Coordinate {
                latitude: 19.12,
                longitude: 72.92,
            },
            place_name: name.to_string(),
            distance_km,
            weather: snapshot(name, 0.5),
            nearby_places: vec![PlaceInfo {
                name: "St. Xavier's College".to_string(),
                category: "college".to_string(),
                address_parts: vec!["Mahapalika Marg".to_string()],
                phone: None,
                coordinate: None,
            }],
        }
    }

    #[test]
    fn test_alert_contains_conditions_zones_and_contacts() {
        let message = compose_alert(&user(), &snapshot("Mumbai", 14.2), &[zone("Thane", 7.412)]);

        assert_eq!(message.subject, ALERT_SUBJECT);
        assert!(message.body.starts_with("Dear Asha,"));
        assert!(message.body.contains("Location: Linking Road, Mumbai"));
        assert!(message.body.contains("- Precipitation: 14.20 mm/h"));
        assert!(message.body.contains("1. Thane"));
        assert!(message.body.contains("Distance: 7.41 km"));
        assert!(message.body.contains("St. Xavier's College (college)"));
        assert!(message.body.contains("Address: Mahapalika Marg"));
        for (name, number) in EMERGENCY_CONTACTS {
            assert!(message.body.contains(&format!("- {name}: {number}")));
        }
    }

    #[test]
    fn test_no_zones_message() {
        let message = compose_alert(&user(), &snapshot("Mumbai", 14.2), &[]);
        assert!(message.body.contains("No safe locations found in your vicinity."));
        assert!(!message.body.contains("Please move to one of these"));
        assert!(message.body.contains("National Emergency: 112"));
    }

    #[test]
    fn test_zones_are_numbered_in_order() {
        let text = format_safe_zones(&[zone("Thane", 5.0), zone("Kalyan", 9.0)]);
        let thane = text.find("1. Thane").unwrap();
        let kalyan = text.find("2. Kalyan").unwrap();
        assert!(thane < kalyan);
    }
}
