//! Delivery of drained output to the host.

use crate::error::Error;
use crate::host::{EditorBuffer, Notifier, TextCodec};
use crate::protocol::{EolMode, normalize_eol};
use crate::state::Drained;

use super::stall::StallAction;

/// Summary of one drain tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// The output lock was contended and the tick did nothing.
    pub skipped: bool,
    /// Output items inserted into the editor.
    pub output_delivered: usize,
    /// Error items handed to the notifier.
    pub errors_delivered: usize,
    /// Empty items skipped.
    pub empty: usize,
    /// Items dropped because they came from a replaced worker.
    pub stale: usize,
    /// Output items that could not be encoded for the buffer.
    pub encoding_failures: usize,
    /// Setup fault reported by this tick.
    pub fault: Option<String>,
    /// Decision of the stall monitor.
    pub stall: StallAction,
}

impl DrainReport {
    /// A report for a tick that could not take the output lock.
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// Whether anything reached the host.
    pub fn delivered_anything(&self) -> bool {
        self.output_delivered > 0 || self.errors_delivered > 0 || self.fault.is_some()
    }
}

/// Deliver everything moved out by one drain.
///
/// Output goes to the editor in the buffer's line ending and encoding; error
/// text goes to the notifier with `\r\n` line endings. Empty items are
/// skipped.
pub fn deliver(
    drained: Drained,
    editor: &mut dyn EditorBuffer,
    codec: &dyn TextCodec,
    notifier: &mut dyn Notifier,
) -> DrainReport {
    let mut report = DrainReport {
        stale: drained.stale,
        ..DrainReport::default()
    };

    if report.stale > 0 {
        tracing::debug!(stale = report.stale, "Dropped output of a replaced worker");
    }

    if let Some(fault) = drained.fault {
        tracing::error!("Session setup failed: {}", fault);
        notifier.notify(&normalize_eol(&Error::Faulted(fault.clone()).with_hint(), EolMode::CrLf));
        report.fault = Some(fault);
    }

    let eol = editor.eol_mode();
    let utf8 = editor.is_utf8();
    for text in drained.output {
        if text.is_empty() {
            report.empty += 1;
            continue;
        }

        match codec.from_utf8(&normalize_eol(&text, eol), utf8) {
            Ok(bytes) => {
                editor.add_text(&bytes);
                report.output_delivered += 1;
            }
            Err(e) => {
                tracing::warn!("Could not insert output: {}", e);
                notifier.notify(&normalize_eol(&e.with_hint(), EolMode::CrLf));
                report.encoding_failures += 1;
            }
        }
    }

    for text in drained.error {
        if text.is_empty() {
            report.empty += 1;
            continue;
        }

        notifier.notify(&normalize_eol(&text, EolMode::CrLf));
        report.errors_delivered += 1;
    }

    report
}
