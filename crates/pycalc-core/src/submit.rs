//! Turning editor text into queued submissions.

use std::time::Instant;

use crate::error::Result;
use crate::host::{EditorBuffer, TextCodec};
use crate::protocol::{EolMode, Submission};
use crate::state::SessionState;

/// How text is laid out in the buffer it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferFormat {
    /// Line terminator of the buffer.
    pub eol: EolMode,
    /// Whether the buffer is UTF-8 encoded.
    pub utf8: bool,
}

impl BufferFormat {
    /// The format of `editor`.
    pub fn of(editor: &dyn EditorBuffer) -> Self {
        Self {
            eol: editor.eol_mode(),
            utf8: editor.is_utf8(),
        }
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    /// The submission as queued.
    pub submission: Submission,
    /// Whether this submission started the heartbeat.
    pub armed_heartbeat: bool,
}

/// Encode `text` and queue it for the worker.
///
/// Never executes anything; the heartbeat is armed if it was idle.
///
/// # Errors
/// Returns [`Error::Encoding`](crate::Error::Encoding) if the text cannot be
/// decoded from the buffer encoding, or [`Error::Faulted`](crate::Error::Faulted)
/// if the session failed to start.
pub fn submit(
    state: &SessionState,
    codec: &dyn TextCodec,
    format: BufferFormat,
    text: &[u8],
    multiline: bool,
    now: Instant,
) -> Result<Submitted> {
    let decoded = codec.to_utf8(text, format.utf8)?;
    let submission = Submission::from_editor(&decoded, multiline, format.eol);
    let armed_heartbeat = state.enqueue(submission.encode(), now)?;

    tracing::debug!(
        multiline,
        bytes = submission.code.len(),
        armed_heartbeat,
        "Queued submission"
    );

    Ok(Submitted {
        submission,
        armed_heartbeat,
    })
}
