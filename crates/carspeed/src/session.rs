//! Car service session lifecycle.
//!
//! [`CarSession`] drives the permission check, feature detection, car
//! service connection and the vehicle speed subscription across
//! foreground/background transitions. Platform collaborators are reached
//! through the traits in this module so the lifecycle can run against a real
//! platform binding or the simulator in [`crate::sim`].

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::property::{PropertyEvent, PropertyId, SampleRate};
use crate::ui::{UiHandle, UiTask};

/// Permission required to read vehicle speed.
pub const PERMISSION_SPEED: &str = "android.car.permission.CAR_SPEED";

/// Platform feature that marks an automotive build.
pub const FEATURE_AUTOMOTIVE: &str = "android.hardware.type.automotive";

/// Runtime permission checks.
pub trait PermissionGate: Send {
    /// Whether `permission` is currently granted.
    fn is_granted(&self, permission: &str) -> bool;

    /// Ask the user for `permission`. The answer arrives later through
    /// [`CarSession::on_permission_result`].
    fn request(&mut self, permission: &str);
}

/// Platform feature detection.
pub trait FeatureProbe: Send {
    /// Whether the platform declares `feature`.
    fn has_feature(&self, feature: &str) -> bool;
}

/// Connection state of a car service binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No binding exists yet.
    #[default]
    NotCreated,
    /// A connection attempt is in flight.
    Connecting,
    /// The service is bound and usable.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCreated => write!(f, "not created"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// A binding to the platform car service.
pub trait CarService: Send {
    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Whether the service is connected.
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Whether a connection attempt is in flight.
    fn is_connecting(&self) -> bool {
        self.state() == ConnectionState::Connecting
    }

    /// Start connecting. Completion is reported through
    /// [`CarSession::on_service_connected`].
    ///
    /// # Errors
    ///
    /// Returns an error if the connection attempt cannot be started.
    fn connect(&mut self) -> Result<()>;

    /// Release the connection.
    fn disconnect(&mut self);

    /// Register for events of `property`.
    ///
    /// Events are delivered on the service's own task; the stream ends when
    /// the registration is dropped by either side.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is not connected or rejects the
    /// property.
    fn subscribe(
        &mut self,
        property: PropertyId,
        rate: SampleRate,
    ) -> Result<mpsc::Receiver<PropertyEvent>>;
}

/// Creates car service bindings.
pub trait CarServiceFactory: Send {
    /// Create a binding. It may already be connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses to create a binding.
    fn create(&mut self) -> Result<Box<dyn CarService>>;
}

/// What a lifecycle call achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The speed permission was requested; startup resumes once it is granted.
    PermissionRequested,
    /// The user refused the speed permission.
    PermissionDenied,
    /// The platform is not automotive; nothing was started.
    Unsupported,
    /// Waiting for the car service connection.
    Connecting,
    /// A new speed subscription was registered.
    Subscribed,
    /// A live subscription already existed; nothing was registered.
    AlreadySubscribed,
}

impl StartOutcome {
    /// Whether speed events are flowing after this call.
    #[must_use]
    pub const fn is_subscribed(self) -> bool {
        matches!(self, Self::Subscribed | Self::AlreadySubscribed)
    }
}

/// A live property registration forwarding events to the UI loop.
///
/// Dropping it stops the forwarding.
#[derive(Debug)]
pub struct Subscription {
    property: PropertyId,
    task: JoinHandle<()>,
    joined: bool,
}

impl Subscription {
    /// Start forwarding `events` to `ui`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(
        property: PropertyId,
        events: mpsc::Receiver<PropertyEvent>,
        ui: UiHandle,
    ) -> Self {
        let task = tokio::spawn(forward(property, events, ui));
        Self {
            property,
            task,
            joined: false,
        }
    }

    /// Whether the event stream is still being forwarded.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Wait until the event stream ends.
    pub async fn finished(&mut self) {
        if self.joined {
            return;
        }
        let result = (&mut self.task).await;
        self.joined = true;
        if let Err(e) = result {
            if !e.is_cancelled() {
                warn!(property = %self.property, error = %e, "subscription task failed");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// Runs on the property service's side: log and hand over, never touch state.
async fn forward(property: PropertyId, mut events: mpsc::Receiver<PropertyEvent>, ui: UiHandle) {
    while let Some(event) = events.recv().await {
        match event {
            PropertyEvent::Change(value) => {
                debug!(property = %value.property, value = %value.value, "property changed");
                if ui.post(UiTask::PropertyChanged(value)).is_err() {
                    debug!(%property, "UI loop closed, dropping subscription");
                    return;
                }
            }
            PropertyEvent::Error { property, area } => {
                warn!(%property, area, "property error event");
            }
        }
    }
    debug!(%property, "property stream ended");
}

/// Foreground lifecycle of the speed feature.
pub struct CarSession {
    permissions: Box<dyn PermissionGate>,
    features: Box<dyn FeatureProbe>,
    factory: Box<dyn CarServiceFactory>,
    car: Option<Box<dyn CarService>>,
    subscription: Option<Subscription>,
    ui: UiHandle,
    rate: SampleRate,
}

impl fmt::Debug for CarSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CarSession")
            .field("connection", &self.connection_state())
            .field("subscription", &self.subscription)
            .field("rate", &self.rate)
            .finish_non_exhaustive()
    }
}

impl CarSession {
    /// Create a session that posts speed events to `ui`.
    #[must_use]
    pub fn new(
        permissions: Box<dyn PermissionGate>,
        features: Box<dyn FeatureProbe>,
        factory: Box<dyn CarServiceFactory>,
        ui: UiHandle,
        rate: SampleRate,
    ) -> Self {
        Self {
            permissions,
            features,
            factory,
            car: None,
            subscription: None,
            ui,
            rate,
        }
    }

    /// Connection state of the current binding.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.car
            .as_ref()
            .map_or(ConnectionState::NotCreated, |car| car.state())
    }

    /// Whether speed events are currently being forwarded.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    /// Bring the feature up when the app comes to the foreground.
    ///
    /// Safe to call repeatedly: an existing subscription is never doubled and
    /// a connection already in flight is not restarted.
    ///
    /// # Errors
    ///
    /// Returns an error if the car service cannot be created, connected or
    /// subscribed.
    pub fn resume(&mut self) -> Result<StartOutcome> {
        if !self.permissions.is_granted(PERMISSION_SPEED) {
            debug!(permission = PERMISSION_SPEED, "permission not granted, requesting");
            self.permissions.request(PERMISSION_SPEED);
            return Ok(StartOutcome::PermissionRequested);
        }
        debug!(permission = PERMISSION_SPEED, "permission granted");

        let Some(car) = self.car.as_mut() else {
            return self.initialize();
        };

        match car.state() {
            ConnectionState::Connected => self.ensure_subscribed(),
            ConnectionState::Connecting => {
                debug!("car service connection already in flight");
                Ok(StartOutcome::Connecting)
            }
            ConnectionState::NotCreated => {
                debug!("reconnecting car service");
                car.connect()?;
                Ok(StartOutcome::Connecting)
            }
        }
    }

    /// Deliver the user's answer to a permission request.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`resume`](Self::resume) when the speed
    /// permission was granted.
    pub fn on_permission_result(
        &mut self,
        permission: &str,
        granted: bool,
    ) -> Result<StartOutcome> {
        if permission == PERMISSION_SPEED && granted {
            debug!(permission, "permission granted by user");
            self.resume()
        } else {
            info!(permission, granted, "speed permission not granted, staying idle");
            Ok(StartOutcome::PermissionDenied)
        }
    }

    /// The car service finished connecting.
    ///
    /// # Errors
    ///
    /// Returns an error if subscribing to vehicle speed fails.
    pub fn on_service_connected(&mut self) -> Result<StartOutcome> {
        debug!("car service connected");
        self.ensure_subscribed()
    }

    /// The car service connection was lost.
    pub fn on_service_disconnected(&mut self) {
        debug!("car service disconnected");
        self.subscription = None;
    }

    /// Release the car service when the app leaves the foreground.
    pub fn pause(&mut self) {
        let Some(car) = self.car.as_mut() else {
            debug!("pause without car service");
            return;
        };

        if car.is_connected() {
            debug!("disconnecting car service");
            car.disconnect();
            self.subscription = None;
        }
    }

    /// Wait until the current speed stream ends, if there is one.
    pub async fn wait_for_stream_end(&mut self) {
        if let Some(subscription) = self.subscription.as_mut() {
            subscription.finished().await;
        }
    }

    fn initialize(&mut self) -> Result<StartOutcome> {
        if !self.features.has_feature(FEATURE_AUTOMOTIVE) {
            let error = Error::feature_unavailable(FEATURE_AUTOMOTIVE);
            warn!(%error, "car service disabled");
            return Ok(StartOutcome::Unsupported);
        }

        debug!("creating car service");
        let mut car = self.factory.create()?;
        let outcome = match car.state() {
            ConnectionState::Connected => None,
            ConnectionState::Connecting => Some(StartOutcome::Connecting),
            ConnectionState::NotCreated => {
                car.connect()?;
                Some(StartOutcome::Connecting)
            }
        };
        self.car = Some(car);

        match outcome {
            Some(outcome) => Ok(outcome),
            None => self.ensure_subscribed(),
        }
    }

    fn ensure_subscribed(&mut self) -> Result<StartOutcome> {
        if self.is_subscribed() {
            debug!("speed subscription already registered");
            return Ok(StartOutcome::AlreadySubscribed);
        }

        let property = PropertyId::PERF_VEHICLE_SPEED;
        let car = self
            .car
            .as_mut()
            .filter(|car| car.is_connected())
            .ok_or_else(|| Error::subscribe(property, "car service not connected"))?;

        debug!(%property, rate = %self.rate, "registering speed callback");
        let events = car.subscribe(property, self.rate)?;
        self.subscription = Some(Subscription::spawn(property, events, self.ui.clone()));
        Ok(StartOutcome::Subscribed)
    }
}
