//! Vehicle property types.
//!
//! Values and events as delivered by the platform's vehicle property
//! service. The service itself is reached through
//! [`CarService::subscribe`](crate::session::CarService::subscribe).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a vehicle property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub i32);

impl PropertyId {
    /// Vehicle speed as reported by the powertrain, in meters per second.
    pub const PERF_VEHICLE_SPEED: Self = Self(0x1160_0207);
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Sampling rate hint passed when subscribing to a property.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRate {
    /// Deliver only when the value changes.
    OnChange,
    /// Roughly once per second.
    #[default]
    Normal,
    /// Rate suitable for driving UI widgets.
    Ui,
    /// Fast sampling.
    Fast,
    /// As fast as the platform allows.
    Fastest,
}

impl SampleRate {
    /// The rate in hertz as understood by the property service.
    #[must_use]
    pub fn hz(self) -> f32 {
        match self {
            Self::OnChange => 0.0,
            Self::Normal => 1.0,
            Self::Ui => 5.0,
            Self::Fast => 10.0,
            Self::Fastest => 100.0,
        }
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnChange => write!(f, "on_change"),
            Self::Normal => write!(f, "normal"),
            Self::Ui => write!(f, "ui"),
            Self::Fast => write!(f, "fast"),
            Self::Fastest => write!(f, "fastest"),
        }
    }
}

/// An untyped property payload.
///
/// The property service hands out values without a static type; consumers
/// read them through their textual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// A floating point reading.
    Float(f32),
    /// An integer reading.
    Int(i64),
    /// Any other payload, kept as text.
    Text(String),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A single property value change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    /// The property that changed.
    pub property: PropertyId,

    /// Vehicle area (zone) the value belongs to; 0 for global properties.
    pub area: i32,

    /// When the platform sampled the value.
    pub timestamp: DateTime<Utc>,

    /// The raw payload.
    pub value: RawValue,
}

impl PropertyValue {
    /// Create a global-area value sampled now.
    #[must_use]
    pub fn new(property: PropertyId, value: RawValue) -> Self {
        Self {
            property,
            area: 0,
            timestamp: Utc::now(),
            value,
        }
    }
}

/// An event delivered by a property subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyEvent {
    /// The property produced a new value.
    Change(PropertyValue),

    /// The property service reported an error for a property and area.
    Error {
        /// The affected property.
        property: PropertyId,
        /// The affected area.
        area: i32,
    },
}
