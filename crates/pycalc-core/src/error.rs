//! Error types for pycalc-core.

use thiserror::Error;

/// Result type for pycalc-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pycalc-core.
///
/// Script errors raised by submitted code are never represented here: they
/// are rendered as text and travel through the error queue like any other
/// output.
#[derive(Debug, Error)]
pub enum Error {
    /// A queue item did not follow the submission wire format.
    #[error("malformed submission: {0}")]
    Protocol(String),

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The interpreter session could not be created or interrupted.
    #[error("interpreter error: {0}")]
    Interpreter(String),

    /// The session failed to initialize earlier and stays disabled.
    #[error("session is disabled after a setup failure: {0}")]
    Faulted(String),

    /// Text could not be converted between the buffer encoding and UTF-8.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Preference store could not be read or written.
    #[error("preference store error: {0}")]
    Preferences(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Render the error together with a short recovery hint for end users.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Self::Spawn(_) | Self::Interpreter(_) | Self::Faulted(_) => Some(
                "check that a Python 3 runtime is installed and its shared library is on the loader path",
            ),
            Self::Config(_) => Some("fix or delete the configuration file to fall back to defaults"),
            Self::Preferences(_) => Some("the preference file can be deleted safely; it is recreated on toggle"),
            Self::Encoding(_) => Some("switch the buffer to UTF-8"),
            Self::Protocol(_) | Self::Io(_) | Self::Json(_) => None,
        };

        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_appended_for_setup_failures() {
        let err = Error::Faulted("no libpython".to_string());
        let rendered = err.with_hint();
        assert!(rendered.starts_with("session is disabled after a setup failure: no libpython"));
        assert!(rendered.contains("hint:"));
    }

    #[test]
    fn test_no_hint_for_protocol_errors() {
        let err = Error::Protocol("empty".to_string());
        assert_eq!(err.with_hint(), "malformed submission: empty");
    }
}
