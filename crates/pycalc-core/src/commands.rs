//! User commands wired to the host's menu, shortcuts and key events.

use crate::error::Result;
use crate::host::{EditorBuffer, TextCodec};
use crate::prefs::PreferenceStore;
use crate::protocol::ends_with_eol;
use crate::session::SessionManager;
use crate::submit::{BufferFormat, Submitted};

/// An event raised by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The user asked to evaluate the current selection.
    EvaluateSelection,
    /// A character was typed into the buffer.
    CharAdded(char),
    /// The user toggled line-triggered evaluation.
    ToggleEnabled,
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Nothing to do for this event.
    Ignored,
    /// Text was queued for evaluation.
    Submitted(Submitted),
    /// The enable flag now has this value; the host updates its menu check.
    Toggled(bool),
}

/// Evaluate the selection as one unit.
///
/// The selection collapses to its end. When it does not end in a line
/// terminator one is inserted, so the output starts on a fresh line.
/// An empty selection does nothing.
pub fn evaluate_selection(
    editor: &mut dyn EditorBuffer,
    codec: &dyn TextCodec,
    session: &SessionManager,
) -> Result<Option<Submitted>> {
    let selection = editor.selection();
    if selection.is_empty() {
        return Ok(None);
    }

    let format = BufferFormat::of(editor);
    editor.collapse_selection();
    if !ends_with_eol(&String::from_utf8_lossy(&selection)) {
        editor.add_text(format.eol.as_str().as_bytes());
    }

    session.submit(codec, format, &selection, true).map(Some)
}

/// Evaluate the line just completed when Enter is typed.
///
/// Only acts when `enabled` is set and `ch` is the Enter character of the
/// buffer's line-ending mode. A zero-length line is ignored; a blank line
/// (just a terminator) is submitted so it can close an open block.
pub fn on_char_added(
    ch: char,
    editor: &dyn EditorBuffer,
    codec: &dyn TextCodec,
    session: &SessionManager,
    enabled: bool,
) -> Result<Option<Submitted>> {
    let format = BufferFormat::of(editor);
    if !enabled || !format.eol.is_enter(ch) {
        return Ok(None);
    }

    let line = editor.line_before_caret();
    if line.is_empty() {
        return Ok(None);
    }

    session.submit(codec, format, &line, false).map(Some)
}

/// Flip and persist the enable flag, returning the new value.
pub fn toggle_enabled(store: &mut dyn PreferenceStore) -> Result<bool> {
    let enabled = !store.load_enabled()?;
    store.store_enabled(enabled)?;
    tracing::info!(enabled, "Toggled line evaluation");
    Ok(enabled)
}

/// Dispatches host events, tracking the enable flag.
pub struct Commands<P> {
    prefs: P,
    enabled: bool,
}

impl<P: PreferenceStore> Commands<P> {
    /// Read the persisted flag from `prefs`.
    pub fn new(prefs: P) -> Result<Self> {
        let enabled = prefs.load_enabled()?;
        Ok(Self { prefs, enabled })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Handle one event.
    pub fn handle(
        &mut self,
        event: HostEvent,
        editor: &mut dyn EditorBuffer,
        codec: &dyn TextCodec,
        session: &SessionManager,
    ) -> Result<CommandOutcome> {
        let submitted = match event {
            HostEvent::EvaluateSelection => evaluate_selection(editor, codec, session)?,
            HostEvent::CharAdded(ch) => on_char_added(ch, editor, codec, session, self.enabled)?,
            HostEvent::ToggleEnabled => {
                self.enabled = toggle_enabled(&mut self.prefs)?;
                return Ok(CommandOutcome::Toggled(self.enabled));
            }
        };

        Ok(submitted.map_or(CommandOutcome::Ignored, CommandOutcome::Submitted))
    }
}
