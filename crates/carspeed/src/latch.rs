//! Over-speed alert latch.
//!
//! A one-bit state machine that lets the over-speed alert fire once and then
//! stays quiet until the driver acknowledges it. Slowing down does not rearm
//! the latch; only [`AlertLatch::acknowledge`] does.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default over-speed threshold, in display units.
pub const DEFAULT_THRESHOLD: i32 = 60;

/// When the latch should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPolicy {
    /// Speeds strictly above this value are over-speed.
    pub threshold: i32,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl AlertPolicy {
    /// Create a policy with the given threshold.
    #[must_use]
    pub const fn new(threshold: i32) -> Self {
        Self { threshold }
    }

    /// Whether `speed` is above the threshold.
    #[must_use]
    pub const fn is_over(&self, speed: i32) -> bool {
        speed > self.threshold
    }
}

/// State of the over-speed alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLatch {
    /// Ready to raise an alert.
    #[default]
    Armed,
    /// An alert has been raised and not yet acknowledged.
    Fired,
}

impl AlertLatch {
    /// Feed a new display speed into the latch.
    ///
    /// Returns `true` exactly when this call moves the latch from
    /// [`Armed`](Self::Armed) to [`Fired`](Self::Fired); the caller then
    /// raises the alert.
    pub fn observe(&mut self, speed: i32, policy: &AlertPolicy) -> bool {
        match self {
            Self::Armed if policy.is_over(speed) => {
                *self = Self::Fired;
                true
            }
            _ => false,
        }
    }

    /// Rearm the latch after the driver dismissed the alert.
    pub fn acknowledge(&mut self) {
        if *self == Self::Armed {
            debug!("acknowledge on an armed latch ignored");
        }
        *self = Self::Armed;
    }

    /// Whether an alert is outstanding.
    #[must_use]
    pub const fn is_fired(&self) -> bool {
        matches!(self, Self::Fired)
    }
}
