//! Tunables for a pycalc session.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::interpreter::SessionOptions;

/// Session configuration.
///
/// Every field has a default, so a partial (or empty) file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Drain cadence of the host timer, in milliseconds.
    pub tick_interval_ms: u64,

    /// Age at which an outstanding submission counts as stalled, in seconds.
    pub stall_threshold_secs: u64,

    /// Error notification timings.
    pub notification: NotificationConfig,

    /// Drop single-line output that only repeats the line entered.
    pub echo_suppression: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            stall_threshold_secs: 30,
            notification: NotificationConfig::default(),
            echo_suppression: true,
        }
    }
}

/// Timings of the error notification window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Close the notification after this many milliseconds.
    pub dismiss_after_ms: u64,

    /// Hand focus back to the editor after this many milliseconds.
    pub refocus_after_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dismiss_after_ms: 7000,
            refocus_after_ms: 50,
        }
    }
}

impl NotificationConfig {
    pub fn dismiss_after(&self) -> Duration {
        Duration::from_millis(self.dismiss_after_ms)
    }

    pub fn refocus_after(&self) -> Duration {
        Duration::from_millis(self.refocus_after_ms)
    }
}

impl Config {
    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file exists but cannot be read or is
    /// not valid configuration JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::Config(format!("cannot read {}: {}", path.display(), e)));
            }
        };

        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be positive".to_string()));
        }
        if self.stall_threshold_secs == 0 {
            return Err(Error::Config("stall_threshold_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_secs(self.stall_threshold_secs)
    }

    /// Options handed to every interpreter session.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            echo_suppression: self.echo_suppression,
        }
    }
}
