//! Core engine for pycalc, evaluating Python snippets from inside an editor.
//!
//! This crate provides:
//! - Shared session state with separate input and output lock domains
//! - An execution worker running a persistent interactive session
//! - A non-blocking drain tick delivering output to the host
//! - Stall detection with forced interruption and session restart
//! - Host commands (evaluate selection, evaluate line on Enter, toggle)

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod execute;
pub mod host;
pub mod interpreter;
pub mod paths;
pub mod prefs;
pub mod protocol;
pub mod session;
pub mod state;
pub mod submit;

pub use commands::{CommandOutcome, Commands, HostEvent};
pub use config::{Config, NotificationConfig};
pub use dispatch::{DrainReport, PromptAnswer, StallAction, StallMonitor, StallState};
pub use error::{Error, Result};
pub use execute::{StopHandle, WorkerHandle};
pub use host::{EditorBuffer, Notifier, StallPrompt, TextCodec, Utf8Codec};
#[cfg(feature = "python")]
pub use interpreter::PythonBackend;
#[cfg(any(test, feature = "scripted"))]
pub use interpreter::ScriptedBackend;
pub use interpreter::{Captured, InterpreterSession, SessionBackend, SessionOptions};
pub use paths::PycalcDirs;
pub use prefs::{FilePreferences, MemoryPreferences, PreferenceStore};
pub use protocol::{EolMode, Submission};
pub use session::SessionManager;
pub use state::SessionState;
pub use submit::{BufferFormat, Submitted};
