//! Configuration directory management.
//!
//! Provides consistent file locations for pycalc, ensuring the same paths
//! are used by every host.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File locations for pycalc.
///
/// Everything lives under one directory inside the platform configuration
/// directory:
///
/// ```text
/// <config dir>/pycalc/
/// ├── config.json       # Tunables (tick interval, stall threshold, ...)
/// └── preferences.json  # Persisted on/off flag
/// ```
#[derive(Debug, Clone)]
pub struct PycalcDirs {
    /// The `pycalc` directory itself.
    pub root: PathBuf,

    /// Configuration file.
    pub config_file: PathBuf,

    /// Preference file.
    pub preferences_file: PathBuf,
}

impl PycalcDirs {
    /// Locate the directory under the platform configuration directory.
    ///
    /// # Errors
    /// Returns an error if the platform has no configuration directory or
    /// the directory cannot be created.
    pub fn discover() -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Config("no configuration directory on this platform".to_string()))?;
        Self::from_base(&base)
    }

    /// Create the layout under `base`.
    ///
    /// Creates the `pycalc` directory if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if directory creation fails.
    pub fn from_base(base: &Path) -> Result<Self> {
        let root = base.join("pycalc");
        fs::create_dir_all(&root)?;

        Ok(Self {
            config_file: root.join("config.json"),
            preferences_file: root.join("preferences.json"),
            root,
        })
    }
}
