//! The UI context.
//!
//! [`UiLoop`] is the only owner of [`SpeedState`] and of the display and
//! notification sinks. Everything else talks to it by posting [`UiTask`]s
//! through a [`UiHandle`]; tasks run one at a time, in posting order.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

use crate::config::{Config, MessagesConfig};
use crate::convert::parse_raw;
use crate::error::{Error, Result};
use crate::latch::AlertPolicy;
use crate::monitor::{reduce, Effect, SpeedEvent, SpeedState};
use crate::property::PropertyValue;
use crate::sink::{DisplaySink, NotificationSink, PushSink};

/// Work submitted to the UI loop.
#[derive(Debug)]
pub enum UiTask {
    /// A speed property value arrived.
    PropertyChanged(PropertyValue),

    /// The driver dismissed the over-speed dialog with this id.
    ///
    /// Ignored unless that dialog is the one currently open.
    Acknowledge(u64),

    /// The push sink issued a device token.
    PushTokenReady(String),

    /// Reply with the state once every earlier task has run.
    Sync(oneshot::Sender<SpeedState>),

    /// Stop the loop after the tasks already queued.
    Shutdown,
}

/// Cloneable handle for posting work to the UI loop.
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiTask>,
    state: watch::Receiver<SpeedState>,
}

impl UiHandle {
    /// Queue a task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UiClosed`] if the loop has stopped.
    pub fn post(&self, task: UiTask) -> Result<()> {
        self.tx.send(task).map_err(|_| Error::UiClosed)
    }

    /// Ask the loop to stop once the queued tasks are done.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UiClosed`] if the loop has already stopped.
    pub fn shutdown(&self) -> Result<()> {
        self.post(UiTask::Shutdown)
    }

    /// Whether the loop has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Wait until every task posted before this call has run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UiClosed`] if the loop stops first.
    pub async fn sync(&self) -> Result<SpeedState> {
        let (reply, rx) = oneshot::channel();
        self.post(UiTask::Sync(reply))?;
        rx.await.map_err(|_| Error::UiClosed)
    }

    /// Wait until no over-speed alert is outstanding.
    ///
    /// Tasks already queued run first. Returns `false` if the alert is still
    /// unacknowledged after `within`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UiClosed`] if the loop stops first.
    pub async fn wait_until_acknowledged(&self, within: Duration) -> Result<bool> {
        if !self.sync().await?.latch.is_fired() {
            return Ok(true);
        }
        let mut state = self.state.clone();
        let result = match tokio::time::timeout(within, state.wait_for(|s| !s.latch.is_fired())).await {
            Ok(changed) => changed.map(|_| true).map_err(|_| Error::UiClosed),
            Err(_) => Ok(false),
        };
        result
    }
}

/// Callback handed to one over-speed dialog.
///
/// Holds only a weak reference to the loop, so a dialog that is never
/// dismissed does not keep the loop alive.
#[derive(Debug)]
pub struct Acknowledger {
    tx: mpsc::WeakUnboundedSender<UiTask>,
    dialog: u64,
}

impl Acknowledger {
    /// Id of the dialog this callback belongs to.
    #[must_use]
    pub fn dialog(&self) -> u64 {
        self.dialog
    }

    /// Report that the driver dismissed the dialog.
    pub fn acknowledge(self) {
        let dialog = self.dialog;
        let delivered = self
            .tx
            .upgrade()
            .is_some_and(|tx| tx.send(UiTask::Acknowledge(dialog)).is_ok());
        if !delivered {
            debug!(dialog, "acknowledge after UI loop stopped");
        }
    }
}

/// Single-context owner of the speed state and the UI sinks.
pub struct UiLoop {
    state: SpeedState,
    policy: AlertPolicy,
    messages: MessagesConfig,
    display: Box<dyn DisplaySink>,
    notifier: Box<dyn NotificationSink>,
    push: Option<Arc<dyn PushSink>>,
    push_token: Option<String>,
    dialogs_shown: u64,
    open_dialog: Option<u64>,
    tx: mpsc::WeakUnboundedSender<UiTask>,
    rx: mpsc::UnboundedReceiver<UiTask>,
    state_tx: watch::Sender<SpeedState>,
}

impl fmt::Debug for UiLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiLoop")
            .field("state", &self.state)
            .field("policy", &self.policy)
            .field("push", &self.push.is_some())
            .field("push_token", &self.push_token.is_some())
            .field("open_dialog", &self.open_dialog)
            .finish_non_exhaustive()
    }
}

impl UiLoop {
    /// Create a loop and the handle that feeds it.
    ///
    /// The loop runs until [`UiTask::Shutdown`] is processed or every
    /// [`UiHandle`] has been dropped.
    #[must_use]
    pub fn new(
        config: &Config,
        display: Box<dyn DisplaySink>,
        notifier: Box<dyn NotificationSink>,
    ) -> (Self, UiHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SpeedState::default());
        let ui = Self {
            state: SpeedState::default(),
            policy: config.policy(),
            messages: config.messages.clone(),
            display,
            notifier,
            push: None,
            push_token: None,
            dialogs_shown: 0,
            open_dialog: None,
            tx: tx.downgrade(),
            rx,
            state_tx,
        };
        (ui, UiHandle { tx, state: state_rx })
    }

    /// Attach a push sink. A token is requested when the loop starts.
    #[must_use]
    pub fn with_push(mut self, sink: Arc<dyn PushSink>) -> Self {
        self.push = Some(sink);
        self
    }

    /// Use a token obtained earlier instead of registering on start.
    #[must_use]
    pub fn with_push_token(mut self, token: impl Into<String>) -> Self {
        self.push_token = Some(token.into());
        self
    }

    /// Observe state changes from outside the loop.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SpeedState> {
        self.state_tx.subscribe()
    }

    /// Process tasks until shutdown and return the final state.
    pub async fn run(mut self) -> SpeedState {
        debug!("UI loop started");
        self.render(self.state.speed);
        self.register_push();

        while let Some(task) = self.rx.recv().await {
            trace!(?task, "UI task");
            match task {
                UiTask::PropertyChanged(value) => self.on_property_changed(&value),
                UiTask::Acknowledge(dialog) => self.on_acknowledge(dialog),
                UiTask::PushTokenReady(token) => {
                    info!("push token received");
                    self.push_token = Some(token);
                }
                UiTask::Sync(reply) => {
                    if reply.send(self.state).is_err() {
                        trace!("sync requester went away");
                    }
                }
                UiTask::Shutdown => break,
            }
        }

        debug!(speed = self.state.speed, "UI loop stopped");
        self.state
    }

    fn on_property_changed(&mut self, value: &PropertyValue) {
        match parse_raw(&value.value) {
            Ok(raw) => self.dispatch(SpeedEvent::Reading(raw)),
            Err(e) => warn!(
                property = %value.property,
                error = %e,
                kept = self.state.speed,
                "skipping speed update"
            ),
        }
    }

    fn on_acknowledge(&mut self, dialog: u64) {
        if self.open_dialog != Some(dialog) {
            debug!(dialog, open = ?self.open_dialog, "ignoring acknowledgement of a closed dialog");
            return;
        }
        self.open_dialog = None;
        self.dispatch(SpeedEvent::Acknowledged);
    }

    fn dispatch(&mut self, event: SpeedEvent) {
        let (next, effects) = reduce(self.state, event, &self.policy);
        if next.latch != self.state.latch {
            debug!(from = ?self.state.latch, to = ?next.latch, "alert latch changed");
        }
        self.state = next;
        self.state_tx.send_replace(next);

        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::UpdateDisplay { speed } => self.render(speed),
            Effect::ShowToast { speed } => {
                info!(speed, threshold = self.policy.threshold, "over-speed alert");
                self.notifier.show_toast(&self.messages.speed_text(speed));
            }
            Effect::ShowAcknowledgeDialog => {
                self.dialogs_shown += 1;
                self.open_dialog = Some(self.dialogs_shown);
                let acknowledger = Acknowledger {
                    tx: self.tx.clone(),
                    dialog: self.dialogs_shown,
                };
                self.notifier
                    .show_acknowledge_dialog(&self.messages.dialog(), acknowledger);
            }
            Effect::SendPush { speed } => self.send_push(speed),
        }
    }

    fn render(&mut self, speed: i32) {
        self.display.set_text(&self.messages.speed_text(speed));
    }

    fn register_push(&self) {
        let Some(sink) = self.push.clone() else {
            return;
        };
        if self.push_token.is_some() {
            return;
        }
        let tx = self.tx.clone();
        tokio::spawn(async move {
            match sink.register().await {
                Ok(token) => {
                    let delivered = tx
                        .upgrade()
                        .is_some_and(|tx| tx.send(UiTask::PushTokenReady(token)).is_ok());
                    if !delivered {
                        debug!("push token issued after UI loop stopped");
                    }
                }
                Err(e) => warn!(error = %e, "push registration failed"),
            }
        });
    }

    fn send_push(&self, speed: i32) {
        let Some(sink) = self.push.clone() else {
            trace!("no push sink configured");
            return;
        };
        let Some(token) = self.push_token.clone() else {
            debug!("push skipped: no token yet");
            return;
        };
        let message = self.messages.push_message(speed);
        tokio::spawn(async move {
            if let Err(e) = sink.send(&token, &message).await {
                warn!(error = %e, "push delivery failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::property::{PropertyId, RawValue};
    use crate::sink::{AlertDialog, PushMessage};

    #[derive(Debug, Default, Clone)]
    struct Recorded {
        display: Arc<Mutex<Vec<String>>>,
        toasts: Arc<Mutex<Vec<String>>>,
        dialogs: Arc<Mutex<Vec<AlertDialog>>>,
        acknowledger: Arc<Mutex<Option<Acknowledger>>>,
    }

    struct RecordingDisplay(Recorded);

    impl DisplaySink for RecordingDisplay {
        fn set_text(&mut self, text: &str) {
            self.0.display.lock().unwrap().push(text.to_string());
        }
    }

    struct RecordingNotifier(Recorded);

    impl NotificationSink for RecordingNotifier {
        fn show_toast(&mut self, message: &str) {
            self.0.toasts.lock().unwrap().push(message.to_string());
        }

        fn show_acknowledge_dialog(&mut self, dialog: &AlertDialog, on_acknowledge: Acknowledger) {
            self.0.dialogs.lock().unwrap().push(dialog.clone());
            *self.0.acknowledger.lock().unwrap() = Some(on_acknowledge);
        }
    }

    #[derive(Default)]
    struct FakePush {
        fail_register: bool,
        sent: Mutex<Vec<(String, PushMessage)>>,
        delivered: Notify,
    }

    #[async_trait]
    impl PushSink for FakePush {
        async fn register(&self) -> Result<String> {
            if self.fail_register {
                Err(Error::push("service unavailable"))
            } else {
                Ok("token-1".to_string())
            }
        }

        async fn send(&self, token: &str, message: &PushMessage) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((token.to_string(), message.clone()));
            self.delivered.notify_one();
            Ok(())
        }
    }

    fn ui_loop() -> (UiLoop, UiHandle, Recorded) {
        crate::logging::init_test_logging();
        let recorded = Recorded::default();
        let (ui, handle) = UiLoop::new(
            &Config::default(),
            Box::new(RecordingDisplay(recorded.clone())),
            Box::new(RecordingNotifier(recorded.clone())),
        );
        (ui, handle, recorded)
    }

    fn speed(value: RawValue) -> UiTask {
        UiTask::PropertyChanged(PropertyValue::new(PropertyId::PERF_VEHICLE_SPEED, value))
    }

    #[tokio::test]
    async fn test_initial_display_is_zero() {
        let (ui, handle, recorded) = ui_loop();
        handle.shutdown().unwrap();
        let state = ui.run().await;

        assert_eq!(state, SpeedState::default());
        assert_eq!(*recorded.display.lock().unwrap(), vec!["Speed: 0 km/h"]);
    }

    #[tokio::test]
    async fn test_sustained_over_speed_alerts_once() {
        let (ui, handle, recorded) = ui_loop();
        for raw in [18.0, 20.0, 25.0] {
            handle.post(speed(RawValue::Float(raw))).unwrap();
        }
        handle.shutdown().unwrap();
        let state = ui.run().await;

        assert_eq!(state.speed, 90);
        assert!(state.latch.is_fired());
        assert_eq!(recorded.display.lock().unwrap().len(), 4);
        assert_eq!(*recorded.toasts.lock().unwrap(), vec!["Speed: 64 km/h"]);
        assert_eq!(recorded.dialogs.lock().unwrap().len(), 1);
        assert_eq!(
            recorded.dialogs.lock().unwrap()[0].title,
            "Car Speed Alert"
        );
    }

    #[tokio::test]
    async fn test_malformed_value_keeps_last_speed() {
        let (ui, handle, recorded) = ui_loop();
        handle.post(speed(RawValue::Float(10.0))).unwrap();
        handle
            .post(speed(RawValue::Text("not-a-number".to_string())))
            .unwrap();
        handle.shutdown().unwrap();
        let state = ui.run().await;

        assert_eq!(state.speed, 36);
        assert_eq!(
            *recorded.display.lock().unwrap(),
            vec!["Speed: 0 km/h", "Speed: 36 km/h"]
        );
    }

    #[tokio::test]
    async fn test_acknowledge_rearms_alert() {
        let (ui, handle, recorded) = ui_loop();
        let mut state_rx = ui.subscribe_state();
        let task = tokio::spawn(ui.run());

        handle.post(speed(RawValue::Float(20.0))).unwrap();
        state_rx.wait_for(|s| s.latch.is_fired()).await.unwrap();

        // A dip without acknowledgement does not rearm.
        handle.post(speed(RawValue::Float(5.0))).unwrap();
        handle.post(speed(RawValue::Float(25.0))).unwrap();
        state_rx.wait_for(|s| s.speed == 90).await.unwrap();
        assert_eq!(recorded.dialogs.lock().unwrap().len(), 1);

        let acknowledger = recorded.acknowledger.lock().unwrap().take().unwrap();
        acknowledger.acknowledge();
        handle.post(speed(RawValue::Float(30.0))).unwrap();
        handle.shutdown().unwrap();

        let state = task.await.unwrap();
        assert_eq!(state.speed, 108);
        assert_eq!(recorded.dialogs.lock().unwrap().len(), 2);
        assert_eq!(recorded.toasts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_acknowledgement_is_ignored() {
        let (ui, handle, recorded) = ui_loop();
        let mut state_rx = ui.subscribe_state();
        let task = tokio::spawn(ui.run());

        handle.post(speed(RawValue::Float(20.0))).unwrap();
        state_rx.wait_for(|s| s.latch.is_fired()).await.unwrap();
        let first = recorded.acknowledger.lock().unwrap().take().unwrap();
        let first_dialog = first.dialog();
        first.acknowledge();

        handle.post(speed(RawValue::Float(25.0))).unwrap();
        handle.sync().await.unwrap();
        assert_eq!(recorded.dialogs.lock().unwrap().len(), 2);

        // A second dismissal of the first dialog must not rearm for the open one.
        handle.post(UiTask::Acknowledge(first_dialog)).unwrap();
        handle.post(speed(RawValue::Float(30.0))).unwrap();
        let state = handle.sync().await.unwrap();
        assert!(state.latch.is_fired());
        assert_eq!(recorded.dialogs.lock().unwrap().len(), 2);

        let second = recorded.acknowledger.lock().unwrap().take().unwrap();
        assert_ne!(second.dialog(), first_dialog);
        second.acknowledge();
        handle.shutdown().unwrap();

        let state = task.await.unwrap();
        assert!(!state.latch.is_fired());
        assert_eq!(recorded.toasts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_acknowledge_without_open_dialog_is_ignored() {
        let (ui, handle, recorded) = ui_loop();
        handle.post(UiTask::Acknowledge(1)).unwrap();
        handle.post(speed(RawValue::Float(20.0))).unwrap();
        handle.shutdown().unwrap();

        let state = ui.run().await;
        assert!(state.latch.is_fired());
        assert_eq!(recorded.dialogs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_until_acknowledged_sees_queued_alert() {
        let (ui, handle, recorded) = ui_loop();
        let task = tokio::spawn(ui.run());

        handle.post(speed(RawValue::Float(20.0))).unwrap();
        let acknowledged = handle
            .wait_until_acknowledged(Duration::from_millis(20))
            .await
            .unwrap();
        assert!(!acknowledged);

        let acknowledger = recorded.acknowledger.lock().unwrap().take().unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            acknowledger.acknowledge();
        });
        let acknowledged = handle
            .wait_until_acknowledged(Duration::from_secs(5))
            .await
            .unwrap();
        assert!(acknowledged);

        handle.shutdown().unwrap();
        assert!(!task.await.unwrap().latch.is_fired());
    }

    #[tokio::test]
    async fn test_wait_until_acknowledged_without_alert() {
        let (ui, handle, _recorded) = ui_loop();
        let task = tokio::spawn(ui.run());

        handle.post(speed(RawValue::Float(10.0))).unwrap();
        assert!(handle
            .wait_until_acknowledged(Duration::ZERO)
            .await
            .unwrap());

        handle.shutdown().unwrap();
        task.await.unwrap();
        assert!(handle.sync().await.unwrap_err().is_ui_closed());
    }

    #[tokio::test]
    async fn test_loop_stops_when_handles_dropped() {
        let (ui, handle, recorded) = ui_loop();
        handle.post(speed(RawValue::Int(20))).unwrap();
        drop(handle);

        let state = ui.run().await;
        assert_eq!(state.speed, 72);

        // Acknowledging into a stopped loop is harmless.
        let acknowledger = recorded.acknowledger.lock().unwrap().take().unwrap();
        acknowledger.acknowledge();
    }

    #[tokio::test]
    async fn test_post_after_stop_is_ui_closed() {
        let (ui, handle, _recorded) = ui_loop();
        handle.shutdown().unwrap();
        ui.run().await;

        assert!(handle.is_closed());
        let err = handle.post(UiTask::Acknowledge(1)).unwrap_err();
        assert!(err.is_ui_closed());
    }

    #[tokio::test]
    async fn test_push_sent_with_seeded_token() {
        let push = Arc::new(FakePush::default());
        let (ui, handle, recorded) = ui_loop();
        let ui = ui
            .with_push(Arc::clone(&push) as Arc<dyn PushSink>)
            .with_push_token("seeded");
        let task = tokio::spawn(ui.run());

        handle.post(speed(RawValue::Float(20.0))).unwrap();
        tokio::time::timeout(Duration::from_secs(5), push.delivered.notified())
            .await
            .unwrap();
        handle.shutdown().unwrap();
        task.await.unwrap();

        let sent = push.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "seeded");
        assert_eq!(sent[0].1.speed, 72);
        assert_eq!(recorded.toasts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_push_token_registered_on_start() {
        let push = Arc::new(FakePush::default());
        let (ui, handle, _recorded) = ui_loop();
        let ui = ui.with_push(Arc::clone(&push) as Arc<dyn PushSink>);
        let task = tokio::spawn(ui.run());

        // Let the loop start and the registration task post its token.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        handle.post(speed(RawValue::Float(20.0))).unwrap();
        tokio::time::timeout(Duration::from_secs(5), push.delivered.notified())
            .await
            .unwrap();
        handle.shutdown().unwrap();
        task.await.unwrap();

        assert_eq!(push.sent.lock().unwrap()[0].0, "token-1");
    }

    #[tokio::test]
    async fn test_push_failure_does_not_block_local_alert() {
        let push = Arc::new(FakePush {
            fail_register: true,
            ..FakePush::default()
        });
        let (ui, handle, recorded) = ui_loop();
        let ui = ui.with_push(push.clone() as Arc<dyn PushSink>);
        handle.post(speed(RawValue::Float(20.0))).unwrap();
        handle.shutdown().unwrap();
        ui.run().await;

        assert_eq!(recorded.toasts.lock().unwrap().len(), 1);
        assert_eq!(recorded.dialogs.lock().unwrap().len(), 1);
        assert!(push.sent.lock().unwrap().is_empty());
    }
}
