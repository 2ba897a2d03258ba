//! Terminal implementations of the host capabilities.
//!
//! The terminal stands in for an editor buffer: output goes to stdout,
//! error notifications to stderr, and the stall prompt is answered by the
//! next line read from stdin.

use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};

use pycalc_core::{EditorBuffer, EolMode, NotificationConfig, Notifier, PromptAnswer, StallPrompt};

use crate::colors;

/// A line-ending-LF, UTF-8 "buffer" whose insertions are printed.
#[derive(Debug, Default)]
pub struct TerminalEditor {
    selection: Vec<u8>,
    previous_line: Vec<u8>,
}

impl TerminalEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `code`, as if the user had highlighted it.
    pub fn select(&mut self, code: &str) {
        self.selection = code.as_bytes().to_vec();
    }

    /// Record `line` as the line just completed by Enter.
    pub fn type_line(&mut self, line: &str) {
        self.previous_line = format!("{line}\n").into_bytes();
    }
}

impl EditorBuffer for TerminalEditor {
    fn eol_mode(&self) -> EolMode {
        EolMode::Lf
    }

    fn is_utf8(&self) -> bool {
        true
    }

    fn add_text(&mut self, text: &[u8]) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(text).and_then(|()| stdout.flush()) {
            tracing::warn!("Could not write output: {}", e);
        }
    }

    fn selection(&self) -> Vec<u8> {
        self.selection.clone()
    }

    fn collapse_selection(&mut self) {
        self.selection.clear();
    }

    fn line_before_caret(&self) -> Vec<u8> {
        self.previous_line.clone()
    }
}

/// Prints error text to stderr.
///
/// Notifications arriving while the previous one is still "on screen"
/// (within `dismiss_after`) are grouped under one header.
#[derive(Debug)]
pub struct ToastNotifier {
    timings: NotificationConfig,
    visible_until: Option<Instant>,
    refocus_at: Option<Instant>,
    shown: usize,
}

impl ToastNotifier {
    pub fn new(timings: NotificationConfig) -> Self {
        Self {
            timings,
            visible_until: None,
            refocus_at: None,
            shown: 0,
        }
    }

    /// Number of notifications shown so far.
    pub fn shown(&self) -> usize {
        self.shown
    }

    /// Expire the current notification and hand the cursor back.
    ///
    /// Returns `true` when the input marker should be redrawn.
    pub fn housekeeping(&mut self, now: Instant) -> bool {
        if self.visible_until.is_some_and(|until| now >= until) {
            self.visible_until = None;
        }
        match self.refocus_at {
            Some(at) if now >= at => {
                self.refocus_at = None;
                true
            }
            _ => false,
        }
    }
}

impl Notifier for ToastNotifier {
    fn notify(&mut self, text: &str) {
        let now = Instant::now();
        let header = self.visible_until.is_none();
        if let Err(e) = write_toast(&mut io::stderr().lock(), header, text) {
            tracing::warn!("Could not show notification: {}", e);
        }

        self.shown += 1;
        self.visible_until = Some(now + self.timings.dismiss_after());
        self.refocus_at = Some(now + self.timings.refocus_after());
    }
}

fn write_toast(out: &mut impl Write, header: bool, text: &str) -> io::Result<()> {
    if header {
        writeln!(out, "{}{}error{}", colors::BOLD, colors::RED, colors::RESET)?;
    }
    write!(out, "{}{}{}", colors::RED, text.replace("\r\n", "\n"), colors::RESET)?;
    out.flush()
}

fn flush_stderr() {
    if let Err(e) = io::stderr().flush() {
        tracing::warn!("Could not flush stderr: {}", e);
    }
}

/// Stall prompt answered by the next stdin line.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    open: bool,
    answer: Option<PromptAnswer>,
    input_closed: bool,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the prompt is waiting for an answer.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Feed the user's reply; anything but "y"/"yes" keeps waiting.
    pub fn answer(&mut self, reply: &str) {
        let reply = reply.trim().to_ascii_lowercase();
        self.answer = Some(if reply == "y" || reply == "yes" {
            PromptAnswer::Terminate
        } else {
            PromptAnswer::KeepWaiting
        });
    }

    /// No one is left to answer; open prompts terminate.
    pub fn close_input(&mut self) {
        self.input_closed = true;
    }
}

impl StallPrompt for TerminalPrompt {
    fn open(&mut self, elapsed: Duration) -> Option<PromptAnswer> {
        if self.input_closed {
            eprintln!(
                "{}Still running after {}s with no input left; terminating.{}",
                colors::YELLOW,
                elapsed.as_secs(),
                colors::RESET
            );
            return Some(PromptAnswer::Terminate);
        }

        eprint!(
            "{}Code has been running for {}s. Terminate it? [y/N] {}",
            colors::YELLOW,
            elapsed.as_secs(),
            colors::RESET
        );
        flush_stderr();
        self.open = true;
        self.answer = None;
        None
    }

    fn poll(&mut self) -> Option<PromptAnswer> {
        if self.input_closed && self.answer.is_none() {
            self.answer = Some(PromptAnswer::Terminate);
        }
        let answer = self.answer.take();
        if answer.is_some() {
            self.open = false;
        }
        answer
    }

    fn dismiss(&mut self) {
        if self.open {
            eprintln!("\n{}Finished; no need to terminate.{}", colors::DIM, colors::RESET);
        }
        self.open = false;
        self.answer = None;
    }
}

/// Stall prompt for unattended runs: always terminates.
#[derive(Debug, Default)]
pub struct AutoTerminate;

impl StallPrompt for AutoTerminate {
    fn open(&mut self, elapsed: Duration) -> Option<PromptAnswer> {
        eprintln!(
            "{}Still running after {}s; terminating.{}",
            colors::YELLOW,
            elapsed.as_secs(),
            colors::RESET
        );
        Some(PromptAnswer::Terminate)
    }

    fn poll(&mut self) -> Option<PromptAnswer> {
        Some(PromptAnswer::Terminate)
    }
}

/// Whether stdin is attached to a terminal (and deserves an input marker).
pub fn interactive() -> bool {
    io::stdin().is_terminal()
}

/// Print the input marker.
pub fn show_marker() {
    eprint!("{}>>> {}", colors::DIM, colors::RESET);
    flush_stderr();
}
