//! Host doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use pycalc_core::{
    Config, DrainReport, EditorBuffer, EolMode, Error, InterpreterSession, Notifier, PromptAnswer,
    Result, ScriptedBackend, SessionBackend, SessionManager, SessionOptions, StallPrompt, Utf8Codec,
};

/// Editor that records everything inserted.
#[derive(Default)]
pub struct RecordingEditor {
    pub eol: EolMode,
    pub text: Vec<u8>,
    pub selection: Vec<u8>,
    pub previous_line: Vec<u8>,
}

impl RecordingEditor {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }
}

impl EditorBuffer for RecordingEditor {
    fn eol_mode(&self) -> EolMode {
        self.eol
    }

    fn is_utf8(&self) -> bool {
        true
    }

    fn add_text(&mut self, text: &[u8]) {
        self.text.extend_from_slice(text);
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

/// Notifier that keeps every message.
#[derive(Default)]
pub struct Toasts(pub Vec<String>);

impl Notifier for Toasts {
    fn notify(&mut self, text: &str) {
        self.0.push(text.to_string());
    }
}

/// Prompt answering from a script.
#[derive(Default)]
pub struct ScriptedPrompt {
    pub answers: VecDeque<PromptAnswer>,
    pub opened: usize,
}

impl ScriptedPrompt {
    pub fn answering(answers: impl IntoIterator<Item = PromptAnswer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            opened: 0,
        }
    }
}

impl StallPrompt for ScriptedPrompt {
    fn open(&mut self, _elapsed: Duration) -> Option<PromptAnswer> {
        self.opened += 1;
        self.answers.pop_front()
    }

    fn poll(&mut self) -> Option<PromptAnswer> {
        self.answers.pop_front()
    }
}

/// Backend whose first `failures` sessions fail to open.
pub struct FlakyBackend {
    inner: ScriptedBackend,
    failures: AtomicUsize,
}

impl FlakyBackend {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            inner: ScriptedBackend::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}

impl SessionBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn open(&self, options: &SessionOptions) -> Result<Box<dyn InterpreterSession>> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Interpreter("transient".to_string()));
        }
        self.inner.open(options)
    }
}

/// A host: editor, notifier and prompt around one session.
pub struct Host {
    pub session: SessionManager,
    pub editor: RecordingEditor,
    pub toasts: Toasts,
    pub prompt: ScriptedPrompt,
}

impl Host {
    pub fn start(backend: impl SessionBackend + 'static, config: Config) -> Self {
        let mut session = SessionManager::new(Arc::new(backend), config);
        session.start().expect("worker should spawn");
        Self {
            session,
            editor: RecordingEditor::default(),
            toasts: Toasts::default(),
            prompt: ScriptedPrompt::default(),
        }
    }

    pub fn submit_line(&self, line: &str) {
        self.session
            .submit(&Utf8Codec, pycalc_core::BufferFormat::of(&self.editor), line.as_bytes(), false)
            .expect("submission should be accepted");
    }

    pub fn submit_selection(&self, code: &str) {
        self.session
            .submit(&Utf8Codec, pycalc_core::BufferFormat::of(&self.editor), code.as_bytes(), true)
            .expect("submission should be accepted");
    }

    pub fn tick(&mut self) -> DrainReport {
        self.session
            .tick(&mut self.editor, &Utf8Codec, &mut self.toasts, &mut self.prompt)
    }

    /// Tick every few milliseconds until the session is idle.
    pub fn run_until_idle(&mut self, timeout: Duration) -> Vec<DrainReport> {
        let deadline = Instant::now() + timeout;
        let mut reports = Vec::new();
        loop {
            reports.push(self.tick());
            if self.session.is_idle() {
                return reports;
            }
            assert!(Instant::now() < deadline, "session did not become idle in {timeout:?}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Tick until `condition` holds for the last report.
    pub fn tick_until(&mut self, timeout: Duration, condition: impl Fn(&DrainReport) -> bool) -> DrainReport {
        let deadline = Instant::now() + timeout;
        loop {
            let report = self.tick();
            if condition(&report) {
                return report;
            }
            assert!(Instant::now() < deadline, "condition not reached in {timeout:?}");
            thread::sleep(Duration::from_millis(5));
        }
    }
}

/// Configuration with a short stall threshold.
pub fn quick_stall_config() -> Config {
    Config {
        stall_threshold_secs: 1,
        ..Config::default()
    }
}
