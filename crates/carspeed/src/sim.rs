//! Simulated vehicle platform.
//!
//! Console-backed implementations of every platform collaborator, used by
//! the `carspeed drive` command to replay a scripted drive through the real
//! session and UI loop.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::property::{PropertyEvent, PropertyId, PropertyValue, RawValue, SampleRate};
use crate::session::{
    CarService, CarServiceFactory, ConnectionState, FeatureProbe, PermissionGate,
    FEATURE_AUTOMOTIVE,
};
use crate::sink::{AlertDialog, DisplaySink, NotificationSink, PushMessage, PushSink};
use crate::ui::Acknowledger;

/// Script token that stands for a property error event.
pub const ERROR_TOKEN: &str = "err";

/// Capacity of the simulated property event channel.
const EVENT_BUFFER: usize = 100;

/// Turn command line tokens into property events.
///
/// Every token becomes a speed value carried as text, except
/// [`ERROR_TOKEN`], which becomes an error event.
#[must_use]
pub fn parse_script<S: AsRef<str>>(tokens: &[S]) -> Vec<PropertyEvent> {
    tokens
        .iter()
        .map(|token| {
            let token: &str = token.as_ref();
            if token.eq_ignore_ascii_case(ERROR_TOKEN) {
                PropertyEvent::Error {
                    property: PropertyId::PERF_VEHICLE_SPEED,
                    area: 0,
                }
            } else {
                PropertyEvent::Change(PropertyValue::new(
                    PropertyId::PERF_VEHICLE_SPEED,
                    RawValue::Text(token.to_string()),
                ))
            }
        })
        .collect()
}

/// Permission gate with a fixed answer.
#[derive(Debug, Clone)]
pub struct StaticPermissions {
    granted: bool,
    grant_on_request: bool,
}

impl StaticPermissions {
    /// Permission already granted.
    #[must_use]
    pub fn granted() -> Self {
        Self {
            granted: true,
            grant_on_request: true,
        }
    }

    /// Permission missing; a request is approved when `approve` is true.
    #[must_use]
    pub fn ask(approve: bool) -> Self {
        Self {
            granted: false,
            grant_on_request: approve,
        }
    }

    /// Whether a request for the permission will be approved.
    #[must_use]
    pub fn will_grant(&self) -> bool {
        self.grant_on_request
    }
}

impl PermissionGate for StaticPermissions {
    fn is_granted(&self, _permission: &str) -> bool {
        self.granted
    }

    fn request(&mut self, permission: &str) {
        println!("[permission] {permission} requested");
        self.granted = self.grant_on_request;
    }
}

/// Feature probe with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticFeatures {
    automotive: bool,
}

impl StaticFeatures {
    /// Create a probe that reports the automotive feature as `automotive`.
    #[must_use]
    pub fn new(automotive: bool) -> Self {
        Self { automotive }
    }
}

impl FeatureProbe for StaticFeatures {
    fn has_feature(&self, feature: &str) -> bool {
        feature == FEATURE_AUTOMOTIVE && self.automotive
    }
}

/// Creates [`ReplayCar`]s that play back a fixed script.
#[derive(Debug, Clone)]
pub struct ReplayCarFactory {
    script: Vec<PropertyEvent>,
    interval: Duration,
}

impl ReplayCarFactory {
    /// Play `script`, one event per `interval`.
    #[must_use]
    pub fn new(script: Vec<PropertyEvent>, interval: Duration) -> Self {
        Self { script, interval }
    }
}

impl CarServiceFactory for ReplayCarFactory {
    fn create(&mut self) -> Result<Box<dyn CarService>> {
        Ok(Box::new(ReplayCar {
            state: ConnectionState::Connected,
            script: self.script.clone(),
            interval: self.interval,
        }))
    }
}

/// A car service that replays scripted events on each subscription.
#[derive(Debug, Clone)]
pub struct ReplayCar {
    state: ConnectionState,
    script: Vec<PropertyEvent>,
    interval: Duration,
}

impl CarService for ReplayCar {
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn connect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            return Err(Error::connection("simulated car is already connected"));
        }
        debug!("simulated car service connecting");
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    fn disconnect(&mut self) {
        debug!("simulated car service disconnected");
        self.state = ConnectionState::NotCreated;
    }

    fn subscribe(
        &mut self,
        property: PropertyId,
        rate: SampleRate,
    ) -> Result<mpsc::Receiver<PropertyEvent>> {
        if self.state != ConnectionState::Connected {
            return Err(Error::subscribe(property, "simulated car is not connected"));
        }
        if property != PropertyId::PERF_VEHICLE_SPEED {
            return Err(Error::subscribe(property, "simulated car only reports speed"));
        }

        debug!(%property, hz = rate.hz(), events = self.script.len(), "replaying script");
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let script = self.script.clone();
        let interval = self.interval;
        tokio::spawn(async move {
            for event in script {
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

/// Prints the speed text to stdout.
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl DisplaySink for ConsoleDisplay {
    fn set_text(&mut self, text: &str) {
        println!("{text}");
    }
}

/// Prints toasts and dialogs to stdout.
///
/// With an acknowledge delay, the dialog is dismissed automatically after
/// that delay, as if the driver pressed its button.
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    ack_after: Option<Duration>,
}

impl ConsoleNotifier {
    /// Create a notifier; `ack_after` of `None` leaves dialogs open.
    #[must_use]
    pub fn new(ack_after: Option<Duration>) -> Self {
        Self { ack_after }
    }
}

impl NotificationSink for ConsoleNotifier {
    fn show_toast(&mut self, message: &str) {
        println!("[toast] {message}");
    }

    fn show_acknowledge_dialog(&mut self, dialog: &AlertDialog, on_acknowledge: Acknowledger) {
        println!("[dialog] {}: {} [{}]", dialog.title, dialog.message, dialog.button);
        let Some(delay) = self.ack_after else {
            return;
        };
        let button = dialog.button.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            println!("[dialog] {button} pressed");
            on_acknowledge.acknowledge();
        });
    }
}

/// Push sink that only logs what it would send.
#[derive(Debug, Default)]
pub struct LogPushSink;

#[async_trait]
impl PushSink for LogPushSink {
    async fn register(&self) -> Result<String> {
        let token = format!("sim-{}", Utc::now().timestamp_millis());
        info!(%token, "simulated push token issued");
        Ok(token)
    }

    async fn send(&self, token: &str, message: &PushMessage) -> Result<()> {
        info!(token, title = %message.title, speed = message.speed, "simulated push sent");
        Ok(())
    }
}
