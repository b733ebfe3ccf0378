//! Output collaborators: display, notifications and push.
//!
//! Display and notification sinks are only ever called from the UI loop.
//! The push sink is optional and runs off the UI loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ui::Acknowledger;

/// Renders the current speed text.
pub trait DisplaySink: Send {
    /// Replace the displayed text.
    fn set_text(&mut self, text: &str);
}

/// Contents of the over-speed dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertDialog {
    /// Dialog title.
    pub title: String,

    /// Dialog body.
    pub message: String,

    /// Label of the single acknowledge button.
    pub button: String,
}

/// Local, user-visible notifications.
pub trait NotificationSink: Send {
    /// Show a short-lived message.
    fn show_toast(&mut self, message: &str);

    /// Show a modal dialog. `on_acknowledge` must be invoked when the driver
    /// dismisses it.
    fn show_acknowledge_dialog(&mut self, dialog: &AlertDialog, on_acknowledge: Acknowledger);
}

/// Payload handed to a push sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Notification title.
    pub title: String,

    /// Notification body.
    pub body: String,

    /// Speed that triggered the alert.
    pub speed: i32,
}

/// Remote push delivery.
///
/// Absence or failure of a push sink never affects the local alert.
#[async_trait]
pub trait PushSink: Send + Sync {
    /// Obtain a device token to address pushes to.
    ///
    /// # Errors
    ///
    /// Returns an error if the push service cannot issue a token.
    async fn register(&self) -> Result<String>;

    /// Deliver `message` to the device identified by `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails.
    async fn send(&self, token: &str, message: &PushMessage) -> Result<()>;
}
