//! Log output for the `carspeed` binary.
//!
//! Lifecycle steps log at debug, alerts at info and degraded conditions
//! (property errors, skipped readings, push failures) at warn. Everything
//! goes to stderr so stdout stays free for the simulated display.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much the binary logs, from `-q` / `-v` / `-vv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Alerts and warnings.
    #[default]
    Normal,
    /// Session lifecycle and every property event.
    Verbose,
    /// Every UI task, with thread ids.
    Trace,
}

impl Verbosity {
    /// Most detailed level shown for the `carspeed` target.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directive used when `RUST_LOG` is not set.
    #[must_use]
    pub fn default_filter(self) -> String {
        format!("carspeed={}", self.level())
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `verbosity` when it is set. Later calls are no-ops.
///
/// # Examples
///
/// ```no_run
/// use carspeed::{init_logging, logging::Verbosity};
///
/// // Show lifecycle and per-event debug lines
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(verbosity == Verbosity::Trace)
            .with_file(false)
            .with_line_number(false),
    );

    // Already installed.
    let _ = subscriber.try_init();
}

/// Route warnings from the UI loop and session tests to the test harness.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("carspeed=warn")
        .with_test_writer()
        .try_init();
}
