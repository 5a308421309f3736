//! Error types and handling for the cloudburst alert service

use thiserror::Error;

/// Main error type for the cloudburst alert service
#[derive(Error, Debug)]
pub enum CloudburstError {
    /// Network failure or non-success status from the weather or map provider
    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    /// Provider answered, but not in the shape we expected
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    /// Signup with an email that is already registered
    #[error("Email already registered: {email}")]
    DuplicateEmail { email: String },

    /// Email delivery failed after the message was built
    #[error("Email transport error: {message}")]
    TransportError { message: String },

    /// The mail server rejected our credentials
    #[error("Email authentication failed: {message}")]
    AuthFailure { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// User directory failures other than constraint violations
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl CloudburstError {
    /// Create a new upstream error
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// Create a new malformed-response error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn duplicate_email<S: Into<String>>(email: S) -> Self {
        Self::DuplicateEmail {
            email: email.into(),
        }
    }

    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::TransportError {
            message: message.into(),
        }
    }

    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::AuthFailure {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            CloudburstError::UpstreamUnavailable { .. } => {
                "Unable to reach the weather or map service. Please try again later.".to_string()
            }
            CloudburstError::MalformedResponse { .. } => {
                "The weather service returned data we could not understand.".to_string()
            }
            CloudburstError::DuplicateEmail { .. } => "Email already exists!".to_string(),
            CloudburstError::TransportError { .. } => {
                "Failed to deliver the alert email.".to_string()
            }
            CloudburstError::AuthFailure { .. } => {
                "Mail server rejected the configured credentials. Please check your SMTP settings."
                    .to_string()
            }
            CloudburstError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            CloudburstError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            CloudburstError::Storage { .. } => {
                "User storage is unavailable. Please try again later.".to_string()
            }
        }
    }
}
