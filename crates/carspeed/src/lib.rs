//! `carspeed` - Vehicle speed display with a one-shot over-speed alert
//!
//! This library reads vehicle speed events from a car service, converts them
//! to display units, renders them and raises a single over-speed alert that
//! stays quiet until the driver acknowledges it.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod latch;
pub mod logging;
pub mod monitor;
pub mod property;
pub mod session;
pub mod sim;
pub mod sink;
pub mod ui;

pub use config::Config;
pub use convert::{convert, display_speed, KM_MULTIPLIER};
pub use error::{Error, Result};
pub use latch::{AlertLatch, AlertPolicy};
pub use logging::init_logging;
pub use monitor::{reduce, Effect, SpeedEvent, SpeedState};
pub use property::{PropertyEvent, PropertyId, PropertyValue, RawValue, SampleRate};
pub use session::{CarService, CarServiceFactory, CarSession, ConnectionState, StartOutcome};
pub use sink::{AlertDialog, DisplaySink, NotificationSink, PushMessage, PushSink};
pub use ui::{Acknowledger, UiHandle, UiLoop, UiTask};
