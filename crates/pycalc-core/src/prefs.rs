//! Persisted on/off flag for line-triggered evaluation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Storage for the enable flag.
///
/// An absent flag reads as enabled.
pub trait PreferenceStore {
    /// Read the flag.
    fn load_enabled(&self) -> Result<bool>;

    /// Persist the flag.
    fn store_enabled(&mut self, enabled: bool) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Preferences {
    enabled: bool,
}

/// Preference store backed by a small JSON file.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferences {
    fn load_enabled(&self) -> Result<bool> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                return Err(Error::Preferences(format!("cannot read {}: {}", self.path.display(), e)));
            }
        };

        serde_json::from_str::<Preferences>(&text)
            .map(|prefs| prefs.enabled)
            .map_err(|e| Error::Preferences(format!("invalid {}: {}", self.path.display(), e)))
    }

    fn store_enabled(&mut self, enabled: bool) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write next to the target and rename so a crash never leaves a
        // truncated file behind.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec_pretty(&Preferences { enabled })?)?;
        fs::rename(&staging, &self.path)?;

        tracing::debug!(enabled, "Stored preference at {}", self.path.display());
        Ok(())
    }
}

/// In-memory preference store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    enabled: Option<bool>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load_enabled(&self) -> Result<bool> {
        Ok(self.enabled.unwrap_or(true))
    }

    fn store_enabled(&mut self, enabled: bool) -> Result<()> {
        self.enabled = Some(enabled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_enabled() {
        let temp = TempDir::new().unwrap();
        let prefs = FilePreferences::new(temp.path().join("preferences.json"));
        assert!(prefs.load_enabled().unwrap());
    }

    #[test]
    fn test_store_then_load() {
        let temp = TempDir::new().unwrap();
        let mut prefs = FilePreferences::new(temp.path().join("nested").join("preferences.json"));

        prefs.store_enabled(false).unwrap();
        assert!(!prefs.load_enabled().unwrap());
        assert!(!prefs.path().with_extension("json.tmp").exists());

        prefs.store_enabled(true).unwrap();
        assert!(prefs.load_enabled().unwrap());
    }

    #[test]
    fn test_corrupt_file_is_preferences_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("preferences.json");
        fs::write(&path, "enabled=1").unwrap();

        let prefs = FilePreferences::new(path);
        assert!(matches!(prefs.load_enabled(), Err(Error::Preferences(_))));
    }

    #[test]
    fn test_memory_store_defaults_to_enabled() {
        let mut prefs = MemoryPreferences::new();
        assert!(prefs.load_enabled().unwrap());
        prefs.store_enabled(false).unwrap();
        assert!(!prefs.load_enabled().unwrap());
    }
}
