//! Cloudburst alerting
//!
//! - message: plaintext alert email composition
//! - pipeline: periodic per-user risk evaluation and dispatch

pub mod message;
pub mod pipeline;

pub use message::{ALERT_SUBJECT, AlertMessage, EMERGENCY_CONTACTS, compose_alert};
pub use pipeline::{AlertPipeline, PassReport, UserOutcome, should_alert};
