//! Per-event speed handling.
//!
//! [`reduce`] is the whole decision logic of the application: it takes the
//! current [`SpeedState`] and one [`SpeedEvent`] and returns the next state
//! together with the [`Effect`]s the UI context must carry out. It never
//! touches a sink itself.

use serde::{Deserialize, Serialize};

use crate::convert::convert;
use crate::latch::{AlertLatch, AlertPolicy};

/// Mutable state owned by the UI context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpeedState {
    /// Last displayed speed, in display units.
    pub speed: i32,

    /// Over-speed alert latch.
    pub latch: AlertLatch,
}

/// Input to the reducer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedEvent {
    /// A parsed raw speed reading.
    Reading(f32),

    /// The driver dismissed the over-speed dialog.
    Acknowledged,
}

/// A side effect requested by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Render `speed` on the display.
    UpdateDisplay {
        /// Speed to render.
        speed: i32,
    },

    /// Show a transient toast with `speed`.
    ShowToast {
        /// Speed to include in the toast.
        speed: i32,
    },

    /// Show the modal over-speed dialog.
    ShowAcknowledgeDialog,

    /// Hand the alert to the push sink, if one is configured.
    SendPush {
        /// Speed that triggered the alert.
        speed: i32,
    },
}

/// Apply one event to the state.
#[must_use]
pub fn reduce(
    state: SpeedState,
    event: SpeedEvent,
    policy: &AlertPolicy,
) -> (SpeedState, Vec<Effect>) {
    let mut next = state;
    match event {
        SpeedEvent::Reading(raw) => {
            next.speed = convert(raw);
            let mut effects = vec![Effect::UpdateDisplay { speed: next.speed }];
            if next.latch.observe(next.speed, policy) {
                effects.extend([
                    Effect::ShowToast { speed: next.speed },
                    Effect::ShowAcknowledgeDialog,
                    Effect::SendPush { speed: next.speed },
                ]);
            }
            (next, effects)
        }
        SpeedEvent::Acknowledged => {
            next.latch.acknowledge();
            (next, Vec::new())
        }
    }
}
