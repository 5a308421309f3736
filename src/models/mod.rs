//! Data models for the cloudburst alert service
//!
//! - Coordinate: validated latitude/longitude pairs
//! - Weather: normalized current-conditions snapshots
//! - Place: amenities returned by the map service
//! - User: registered alert recipients

pub mod location;
pub mod place;
pub mod user;
pub mod weather;

pub use location::Coordinate;
pub use place::PlaceInfo;
pub use user::{NewUser, UserRecord, ValidatedUser};
pub use weather::{UNKNOWN_LOCATION, WeatherSnapshot};
