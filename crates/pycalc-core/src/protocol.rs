//! Submission wire format.
//!
//! A submission travels through the pending-input queue as a single string:
//! a one-character tag (`'1'` multiline, `'0'` single line) followed by the
//! UTF-8 code text, which always ends with a line terminator.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tag prefixed to a selection evaluated as one complete unit.
pub const MULTILINE_TAG: char = '1';

/// Tag prefixed to a line pushed incrementally into the interactive buffer.
pub const SINGLE_LINE_TAG: char = '0';

/// Line terminator configured for an editor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EolMode {
    /// Windows style `\r\n`.
    CrLf,
    /// Classic Mac style `\r`.
    Cr,
    /// Unix style `\n`.
    #[default]
    Lf,
}

impl EolMode {
    /// The terminator as text.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
            Self::Lf => "\n",
        }
    }

    /// Whether `ch` is the character the editor reports when Enter is pressed
    /// in a buffer using this mode.
    pub fn is_enter(self, ch: char) -> bool {
        match self {
            Self::CrLf | Self::Cr => ch == '\r',
            Self::Lf => ch == '\n',
        }
    }
}

/// Rewrite every line ending in `text` (`\r\n`, `\r` or `\n`) to `eol`.
pub fn normalize_eol(text: &str, eol: EolMode) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    match eol {
        EolMode::Lf => unified,
        EolMode::CrLf | EolMode::Cr => unified.replace('\n', eol.as_str()),
    }
}

/// Whether `text` already ends in a line terminator of any style.
pub fn ends_with_eol(text: &str) -> bool {
    text.ends_with('\n') || text.ends_with('\r')
}

/// One unit of user-triggered code awaiting execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Code text, terminated by a line ending.
    pub code: String,
    /// `true` for "run this selection now", `false` for "evaluate the line
    /// just typed, possibly continuing a block".
    pub multiline: bool,
}

impl Submission {
    /// Build a submission from editor text.
    ///
    /// Line endings are normalized to `eol` and the terminator is appended
    /// when missing.
    pub fn from_editor(text: &str, multiline: bool, eol: EolMode) -> Self {
        let mut code = normalize_eol(text, eol);
        if !ends_with_eol(&code) {
            code.push_str(eol.as_str());
        }
        Self { code, multiline }
    }

    /// Encode to the queue wire format.
    pub fn encode(&self) -> String {
        let tag = if self.multiline {
            MULTILINE_TAG
        } else {
            SINGLE_LINE_TAG
        };

        let mut wire = String::with_capacity(self.code.len() + 1);
        wire.push(tag);
        wire.push_str(&self.code);
        wire
    }

    /// Decode a queue item.
    pub fn decode(wire: &str) -> Result<Self> {
        let mut chars = wire.chars();
        let multiline = match chars.next() {
            Some(MULTILINE_TAG) => true,
            Some(SINGLE_LINE_TAG) => false,
            Some(other) => {
                return Err(Error::Protocol(format!("unknown submission tag {other:?}")));
            }
            None => return Err(Error::Protocol("empty submission".to_string())),
        };

        Ok(Self {
            code: chars.as_str().to_string(),
            multiline,
        })
    }

    /// The code with its trailing line terminators removed, as handed to the
    /// interpreter.
    pub fn source(&self) -> &str {
        self.code.trim_end_matches(['\r', '\n'])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_prefixes_tag() {
        let single = Submission::from_editor("x = 5", false, EolMode::Lf);
        assert_eq!(single.encode(), "0x = 5\n");

        let multi = Submission::from_editor("for i in range(3): print(i)\n\n", true, EolMode::Lf);
        assert_eq!(multi.encode(), "1for i in range(3): print(i)\n\n");
    }

    #[test]
    fn test_decode_recovers_flag_and_code() {
        let submission = Submission::decode("0print(x)\n").unwrap();
        assert!(!submission.multiline);
        assert_eq!(submission.code, "print(x)\n");
        assert_eq!(submission.source(), "print(x)");
    }

    #[test]
    fn test_decode_rejects_empty_and_unknown_tags() {
        assert!(matches!(Submission::decode(""), Err(Error::Protocol(_))));
        assert!(matches!(Submission::decode("2print(1)\n"), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_from_editor_appends_host_terminator() {
        let submission = Submission::from_editor("a = 1\nb = 2", true, EolMode::CrLf);
        assert_eq!(submission.code, "a = 1\r\nb = 2\r\n");
    }

    #[test]
    fn test_from_editor_keeps_existing_terminator() {
        let submission = Submission::from_editor("a = 1\r", false, EolMode::Cr);
        assert_eq!(submission.code, "a = 1\r");
    }

    #[test]
    fn test_normalize_mixed_line_endings() {
        assert_eq!(normalize_eol("a\r\nb\rc\n", EolMode::Lf), "a\nb\nc\n");
        assert_eq!(normalize_eol("a\nb", EolMode::CrLf), "a\r\nb");
        assert_eq!(normalize_eol("a\r\nb", EolMode::Cr), "a\rb");
    }

    #[test]
    fn test_enter_key_per_mode() {
        assert!(EolMode::CrLf.is_enter('\r'));
        assert!(!EolMode::CrLf.is_enter('\n'));
        assert!(EolMode::Cr.is_enter('\r'));
        assert!(EolMode::Lf.is_enter('\n'));
        assert!(!EolMode::Lf.is_enter('\r'));
    }

    #[test]
    fn test_source_strips_all_trailing_terminators() {
        let submission = Submission::decode("1if True:\r\n    print(1)\r\n\r\n").unwrap();
        assert_eq!(submission.source(), "if True:\r\n    print(1)");
    }
}
