//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

/// Replay a simulated drive.
#[derive(Debug, Args)]
pub struct DriveCommand {
    /// Raw speed readings in m/s; `err` injects a property error event
    #[arg(required = true, allow_negative_numbers = true, value_name = "VALUE")]
    pub values: Vec<String>,

    /// Delay between readings in milliseconds
    #[arg(short, long, default_value = "0", value_name = "MS")]
    pub interval_ms: u64,

    /// Dismiss the over-speed dialog this many milliseconds after it opens
    #[arg(short, long, value_name = "MS")]
    pub ack_after_ms: Option<u64>,

    /// Start without the speed permission and approve it when asked
    #[arg(long, conflicts_with = "deny_permission")]
    pub ask_permission: bool,

    /// Start without the speed permission and refuse it when asked
    #[arg(long)]
    pub deny_permission: bool,

    /// Pretend the platform is not an automotive build
    #[arg(long)]
    pub no_automotive: bool,

    /// Simulate push notifications even if disabled in the configuration
    #[arg(long)]
    pub push: bool,
}

impl DriveCommand {
    /// Delay between readings.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Delay before the dialog is dismissed, if it is dismissed at all.
    #[must_use]
    pub fn ack_after(&self) -> Option<Duration> {
        self.ack_after_ms.map(Duration::from_millis)
    }
}

/// Convert a single raw reading.
#[derive(Debug, Args)]
pub struct ConvertCommand {
    /// Raw speed reading in m/s
    #[arg(allow_negative_numbers = true)]
    pub raw: String,
}

/// Configuration management commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to config file (uses default if not specified)
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_durations() {
        let cmd = DriveCommand {
            values: vec!["10".to_string()],
            interval_ms: 250,
            ack_after_ms: Some(1_000),
            ask_permission: false,
            deny_permission: false,
            no_automotive: false,
            push: false,
        };
        assert_eq!(cmd.interval(), Duration::from_millis(250));
        assert_eq!(cmd.ack_after(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_drive_without_ack() {
        let cmd = DriveCommand {
            values: vec![],
            interval_ms: 0,
            ack_after_ms: None,
            ask_permission: false,
            deny_permission: false,
            no_automotive: false,
            push: false,
        };
        assert!(cmd.ack_after().is_none());
        assert!(cmd.interval().is_zero());
    }
}
