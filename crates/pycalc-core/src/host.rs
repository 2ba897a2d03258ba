//! Collaborators provided by the host application.
//!
//! The core never touches an editor, a window or a dialog directly. It talks
//! to the host through these traits, all of which are called from the host's
//! control thread.

use std::time::Duration;

use crate::dispatch::PromptAnswer;
use crate::error::{Error, Result};
use crate::protocol::EolMode;

/// The editor buffer the user is typing into.
///
/// Text crosses this boundary in the buffer's own encoding.
pub trait EditorBuffer {
    /// Line terminator configured for the buffer.
    fn eol_mode(&self) -> EolMode;

    /// Whether the buffer is UTF-8 encoded.
    fn is_utf8(&self) -> bool;

    /// Insert text at the current insertion point.
    fn add_text(&mut self, text: &[u8]);

    /// The selected text; empty when nothing is selected.
    fn selection(&self) -> Vec<u8>;

    /// Collapse the selection to its end, leaving the caret there.
    fn collapse_selection(&mut self);

    /// The line just completed, i.e. the line before the caret's line,
    /// including its terminator.
    fn line_before_caret(&self) -> Vec<u8>;
}

/// Conversion between the buffer encoding and UTF-8.
pub trait TextCodec {
    /// Decode buffer text to UTF-8.
    fn to_utf8(&self, text: &[u8], buffer_is_utf8: bool) -> Result<String>;

    /// Encode UTF-8 text for the buffer.
    fn from_utf8(&self, text: &str, buffer_is_utf8: bool) -> Result<Vec<u8>>;
}

/// Codec for UTF-8 buffers, falling back to Latin-1 for anything else.
///
/// Characters Latin-1 cannot represent are written as `?`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl TextCodec for Utf8Codec {
    fn to_utf8(&self, text: &[u8], buffer_is_utf8: bool) -> Result<String> {
        if buffer_is_utf8 {
            String::from_utf8(text.to_vec()).map_err(|e| Error::Encoding(e.to_string()))
        } else {
            Ok(text.iter().map(|&byte| char::from(byte)).collect())
        }
    }

    fn from_utf8(&self, text: &str, buffer_is_utf8: bool) -> Result<Vec<u8>> {
        if buffer_is_utf8 {
            Ok(text.as_bytes().to_vec())
        } else {
            Ok(text
                .chars()
                .map(|ch| u8::try_from(ch).unwrap_or(b'?'))
                .collect())
        }
    }
}

/// Transient display of error text.
///
/// The notifier owns the window's lifetime: it closes it after
/// `dismiss_after` and hands focus back to the editor after `refocus_after`,
/// without blocking the caller.
pub trait Notifier {
    /// Show `text`, whose line endings are already `\r\n`.
    fn notify(&mut self, text: &str);
}

/// The "still running, terminate?" confirmation.
pub trait StallPrompt {
    /// Open the prompt.
    ///
    /// Modal hosts may answer immediately; others return `None` and deliver
    /// the answer through [`poll`](Self::poll).
    fn open(&mut self, elapsed: Duration) -> Option<PromptAnswer>;

    /// Answer of an open prompt, once given.
    fn poll(&mut self) -> Option<PromptAnswer>;

    /// Close an open prompt whose question became moot.
    fn dismiss(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_buffers_pass_through() {
        let codec = Utf8Codec;
        assert_eq!(codec.to_utf8("π = 3".as_bytes(), true).unwrap(), "π = 3");
        assert_eq!(codec.from_utf8("π\n", true).unwrap(), "π\n".as_bytes());
    }

    #[test]
    fn test_invalid_utf8_is_encoding_error() {
        assert!(matches!(Utf8Codec.to_utf8(&[0xff, 0xfe], true), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_latin1_buffers() {
        let codec = Utf8Codec;
        assert_eq!(codec.to_utf8(&[0x63, 0x61, 0x66, 0xe9], false).unwrap(), "café");
        assert_eq!(codec.from_utf8("café π", false).unwrap(), b"caf\xe9 ?".to_vec());
    }
}
