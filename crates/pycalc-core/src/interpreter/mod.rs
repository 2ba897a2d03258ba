//! Interpreter sessions.
//!
//! A backend opens sessions; each session is owned by exactly one worker
//! thread and lives until that worker exits or is abandoned. The embedded
//! CPython backend lives in `python`; `scripted` (feature `scripted`) is a
//! small deterministic interpreter used to exercise the coordination logic
//! without Python.

#[cfg(feature = "python")]
pub mod python;
#[cfg(any(test, feature = "scripted"))]
pub mod scripted;

use std::sync::Arc;

use crate::error::Result;

#[cfg(feature = "python")]
pub use python::PythonBackend;
#[cfg(any(test, feature = "scripted"))]
pub use scripted::ScriptedBackend;

/// Text captured while executing one submission.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    /// Everything written to standard output.
    pub output: String,
    /// Everything written to standard error, including rendered tracebacks.
    pub error: String,
}

impl Captured {
    /// Captured text consisting only of an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            error: message.into(),
        }
    }
}

/// Options applied to every session a backend opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Drop single-line output that merely repeats the submitted line.
    pub echo_suppression: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            echo_suppression: true,
        }
    }
}

/// Forced interruption of a session's running call.
///
/// Called from the control thread while the owning worker may be blocked
/// inside the interpreter.
pub trait Interrupt: Send + Sync {
    /// Abort the call currently running in the session, if any.
    fn interrupt(&self) -> Result<()>;
}

/// A persistent interactive session.
///
/// Script errors are never returned as `Err`: they are rendered into
/// [`Captured::error`].
pub trait InterpreterSession {
    /// Execute one submission.
    ///
    /// When `multiline` is set, any partially entered block is discarded and
    /// `source` runs as one complete unit. Otherwise `source` is a single
    /// line pushed into the interactive buffer.
    fn run(&mut self, source: &str, multiline: bool) -> Captured;

    /// Handle for interrupting this session from another thread.
    fn interrupter(&self) -> Arc<dyn Interrupt>;
}

/// Factory for interpreter sessions.
pub trait SessionBackend: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Open a fresh session. Called on the worker thread that will own it.
    fn open(&self, options: &SessionOptions) -> Result<Box<dyn InterpreterSession>>;
}

/// Whether `output` is nothing but an echo of the single `line` just entered.
pub(crate) fn is_echo(line: &str, output: &str) -> bool {
    output
        .strip_suffix('\n')
        .is_some_and(|body| !body.is_empty() && body == line.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_detection() {
        assert!(is_echo("5", "5\n"));
        assert!(is_echo("  'a'  ", "'a'\n"));
        assert!(!is_echo("x", "5\n"));
        assert!(!is_echo("5", "5"));
        assert!(!is_echo("", "\n"));
    }

    #[test]
    fn test_default_options_suppress_echo() {
        assert!(SessionOptions::default().echo_suppression);
    }
}
