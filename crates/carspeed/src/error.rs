//! Error types for carspeed.
//!
//! This module defines all error types used throughout the carspeed crate,
//! providing detailed context for debugging and user-friendly error messages.

use thiserror::Error;

use crate::property::PropertyId;

/// The main error type for carspeed operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Platform Errors ===
    /// A required platform feature is not present.
    #[error("platform feature not available: {feature}")]
    FeatureUnavailable {
        /// Name of the missing feature.
        feature: String,
    },

    /// The car service connection failed.
    #[error("car service connection failed: {0}")]
    Connection(String),

    /// Registering for property events failed.
    #[error("failed to subscribe to property {property}: {message}")]
    Subscribe {
        /// The property that could not be subscribed.
        property: PropertyId,
        /// Description of what went wrong.
        message: String,
    },

    // === Event Errors ===
    /// A raw property value could not be read as a speed.
    #[error("malformed speed value: {value:?}")]
    MalformedValue {
        /// Textual form of the offending value.
        value: String,
    },

    /// The UI loop has stopped and no longer accepts tasks.
    #[error("UI loop is closed")]
    UiClosed,

    // === Push Errors ===
    /// Push registration or delivery failed.
    #[error("push notification error: {0}")]
    Push(String),
}

/// A specialized Result type for carspeed operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new push error.
    #[must_use]
    pub fn push(message: impl Into<String>) -> Self {
        Self::Push(message.into())
    }

    /// Create a feature-unavailable error.
    #[must_use]
    pub fn feature_unavailable(feature: impl Into<String>) -> Self {
        Self::FeatureUnavailable {
            feature: feature.into(),
        }
    }

    /// Create a subscription error for `property`.
    #[must_use]
    pub fn subscribe(property: PropertyId, message: impl Into<String>) -> Self {
        Self::Subscribe {
            property,
            message: message.into(),
        }
    }

    /// Create a malformed-value error.
    #[must_use]
    pub fn malformed(value: impl Into<String>) -> Self {
        Self::MalformedValue {
            value: value.into(),
        }
    }

    /// Check if this error comes from a value that could not be parsed.
    #[must_use]
    pub fn is_malformed_value(&self) -> bool {
        matches!(self, Self::MalformedValue { .. })
    }

    /// Check if this error means the UI loop has gone away.
    #[must_use]
    pub fn is_ui_closed(&self) -> bool {
        matches!(self, Self::UiClosed)
    }
}
