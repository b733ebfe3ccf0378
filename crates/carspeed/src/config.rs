//! Configuration management for carspeed.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::latch::{AlertPolicy, DEFAULT_THRESHOLD};
use crate::property::SampleRate;
use crate::sink::{AlertDialog, PushMessage};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "carspeed";

/// Placeholder replaced by the speed in message templates.
pub const SPEED_PLACEHOLDER: &str = "{speed}";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CARSPEED_`)
/// 2. TOML config file at `~/.config/carspeed/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Over-speed alert configuration.
    pub alert: AlertConfig,
    /// Vehicle property subscription configuration.
    pub property: PropertyConfig,
    /// User-facing text.
    pub messages: MessagesConfig,
    /// Push notification configuration.
    pub push: PushConfig,
}

/// Over-speed alert configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Speeds strictly above this value (display units) raise the alert.
    pub threshold: i32,
}

/// Vehicle property subscription configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyConfig {
    /// Sampling rate hint for the speed subscription.
    pub rate: SampleRate,
}

/// User-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Speed text template, shown on the display and in the toast.
    /// Must contain `{speed}`.
    pub speed: String,
    /// Over-speed dialog title.
    pub title: String,
    /// Over-speed dialog body.
    pub body: String,
    /// Label of the dialog's acknowledge button.
    pub button: String,
}

/// Push notification configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Register for and send push notifications on over-speed.
    pub enabled: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            speed: "Speed: {speed} km/h".to_string(),
            title: "Car Speed Alert".to_string(),
            body: "Dear customer, Please avoid over speed".to_string(),
            button: "OK".to_string(),
        }
    }
}

impl MessagesConfig {
    /// Render the speed template.
    #[must_use]
    pub fn speed_text(&self, speed: i32) -> String {
        self.speed.replace(SPEED_PLACEHOLDER, &speed.to_string())
    }

    /// The over-speed dialog.
    #[must_use]
    pub fn dialog(&self) -> AlertDialog {
        AlertDialog {
            title: self.title.clone(),
            message: self.body.clone(),
            button: self.button.clone(),
        }
    }

    /// The push payload for an alert at `speed`.
    #[must_use]
    pub fn push_message(&self, speed: i32) -> PushMessage {
        PushMessage {
            title: self.title.clone(),
            body: self.speed_text(speed),
            speed,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Sources are merged in this order, later ones overriding earlier:
    /// 1. Default values
    /// 2. TOML file at `config_path`, or [`default_config_path`](Self::default_config_path)
    /// 3. Environment variables (prefixed with `CARSPEED_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CARSPEED_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.alert.threshold <= 0 {
            return Err(Error::ConfigValidation {
                message: format!(
                    "alert threshold must be greater than 0 (got {})",
                    self.alert.threshold
                ),
            });
        }

        if !self.messages.speed.contains(SPEED_PLACEHOLDER) {
            return Err(Error::ConfigValidation {
                message: format!("messages.speed must contain {SPEED_PLACEHOLDER}"),
            });
        }

        if self.messages.button.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "messages.button must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// The alert policy described by this configuration.
    #[must_use]
    pub fn policy(&self) -> AlertPolicy {
        AlertPolicy::new(self.alert.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.alert.threshold, 60);
        assert_eq!(config.property.rate, SampleRate::Normal);
        assert!(!config.push.enabled);
        assert_eq!(config.messages.title, "Car Speed Alert");
        assert_eq!(config.messages.button, "OK");
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_non_positive_threshold() {
        let mut config = Config::default();
        config.alert.threshold = 0;

        let result = config.validate();
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("threshold"));
    }

    #[test]
    fn test_validate_speed_template_without_placeholder() {
        let mut config = Config::default();
        config.messages.speed = "Speed km/h".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("{speed}"));
    }

    #[test]
    fn test_validate_empty_button() {
        let mut config = Config::default();
        config.messages.button = "  ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_speed_text() {
        let messages = MessagesConfig::default();
        assert_eq!(messages.speed_text(72), "Speed: 72 km/h");
    }

    #[test]
    fn test_dialog() {
        let dialog = MessagesConfig::default().dialog();
        assert_eq!(dialog.title, "Car Speed Alert");
        assert_eq!(dialog.message, "Dear customer, Please avoid over speed");
        assert_eq!(dialog.button, "OK");
    }

    #[test]
    fn test_push_message() {
        let message = MessagesConfig::default().push_message(90);
        assert_eq!(message.speed, 90);
        assert_eq!(message.body, "Speed: 90 km/h");
    }

    #[test]
    fn test_policy() {
        let mut config = Config::default();
        config.alert.threshold = 80;
        assert_eq!(config.policy(), AlertPolicy::new(80));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("carspeed"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());

        let config = result.unwrap();
        assert_eq!(config.alert, AlertConfig::default());
        assert_eq!(config.messages, MessagesConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[alert]
threshold = 90

[property]
rate = "fast"

[messages]
speed = "{{speed}} km/h"
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.alert.threshold, 90);
        assert_eq!(config.property.rate, SampleRate::Fast);
        assert_eq!(config.messages.speed_text(5), "5 km/h");
        assert_eq!(config.messages.title, "Car Speed Alert");
    }

    #[test]
    fn test_load_invalid_file_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[alert]\nthreshold = -5").unwrap();

        let result = Config::load_from(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(Error::ConfigValidation { .. })));
    }

    #[test]
    fn test_config_serialize() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("threshold"));
        assert!(json.contains("\"rate\":\"normal\""));
    }

    #[test]
    fn test_alert_config_deserialize() {
        let json = r#"{"threshold": 120}"#;
        let alert: AlertConfig = serde_json::from_str(json).unwrap();
        assert_eq!(alert.threshold, 120);
    }
}
