//! Resolves configuration and preference locations for a CLI run.

use std::path::{Path, PathBuf};

use pycalc_core::{Config, FilePreferences, PycalcDirs, Result};

const PREFERENCES_FILE: &str = "preferences.json";

/// Everything a command needs from disk.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub preferences: PathBuf,
}

impl Settings {
    /// Load the configuration from `config_path`, or from the platform
    /// directory when none is given.
    ///
    /// The preference file lives next to the configuration file.
    pub fn load(config_path: Option<&Path>, stall_timeout: Option<u64>) -> Result<Self> {
        let (config_file, preferences) = match config_path {
            Some(path) => {
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                (path.to_path_buf(), dir.join(PREFERENCES_FILE))
            }
            None => {
                let dirs = PycalcDirs::discover()?;
                (dirs.config_file, dirs.preferences_file)
            }
        };

        let mut config = Config::load(&config_file)?;
        if let Some(secs) = stall_timeout {
            config.stall_threshold_secs = secs;
            config.validate()?;
        }

        tracing::debug!(config = %config_file.display(), "Loaded settings");
        Ok(Self { config, preferences })
    }

    pub fn preference_store(&self) -> FilePreferences {
        FilePreferences::new(&self.preferences)
    }
}
