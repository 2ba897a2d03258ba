//! Interactive mode: stdin lines stand in for editor key events.
//!
//! Every plain line is treated as typed text followed by Enter. A few
//! colon commands reach the other host actions:
//!
//! ```text
//! :sel <code>      evaluate <code> as a selection
//! :sel ... :end    evaluate the lines in between as a selection
//! :toggle          flip line-triggered evaluation
//! :restart         discard the session and start a fresh one
//! :quit            leave
//! ```

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use pycalc_core::{
    CommandOutcome, Commands, FilePreferences, HostEvent, SessionBackend, SessionManager, StallAction,
    Utf8Codec,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::colors;
use crate::settings::Settings;
use crate::terminal::{self, TerminalEditor, TerminalPrompt, ToastNotifier};

/// What a line asked the loop to do next.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct Repl {
    session: SessionManager,
    commands: Commands<FilePreferences>,
    editor: TerminalEditor,
    toasts: ToastNotifier,
    prompt: TerminalPrompt,
    /// Lines collected between `:sel` and `:end`.
    capture: Option<Vec<String>>,
    interactive: bool,
}

impl Repl {
    fn handle_line(&mut self, line: &str) -> Flow {
        if self.prompt.is_open() {
            self.prompt.answer(line);
            return Flow::Continue;
        }

        if let Some(lines) = self.capture.as_mut() {
            if line.trim() == ":end" {
                let code = lines.iter().map(|l| format!("{l}\n")).collect::<String>();
                self.capture = None;
                self.evaluate_selection(&code);
            } else {
                lines.push(line.to_string());
            }
            return Flow::Continue;
        }

        match line.trim_end() {
            ":quit" => return Flow::Quit,
            ":sel" => self.capture = Some(Vec::new()),
            ":toggle" => self.dispatch(HostEvent::ToggleEnabled),
            ":restart" => {
                if let Err(e) = self.session.restart() {
                    report(&e);
                }
            }
            other => match other.strip_prefix(":sel ") {
                Some(code) => self.evaluate_selection(&format!("{code}\n")),
                None => {
                    self.editor.type_line(line);
                    self.dispatch(HostEvent::CharAdded('\n'));
                }
            },
        }
        Flow::Continue
    }

    fn evaluate_selection(&mut self, code: &str) {
        self.editor.select(code);
        self.dispatch(HostEvent::EvaluateSelection);
    }

    fn dispatch(&mut self, event: HostEvent) {
        match self.commands.handle(event, &mut self.editor, &Utf8Codec, &self.session) {
            Ok(CommandOutcome::Toggled(enabled)) => {
                let state = if enabled { "enabled" } else { "disabled" };
                eprintln!("{}line evaluation is {}{}", colors::DIM, state, colors::RESET);
            }
            Ok(CommandOutcome::Submitted(submitted)) => {
                tracing::debug!(armed = submitted.armed_heartbeat, "Queued submission");
            }
            Ok(CommandOutcome::Ignored) => {}
            Err(e) => report(&e),
        }
    }

    fn tick(&mut self) {
        let report = self
            .session
            .tick(&mut self.editor, &Utf8Codec, &mut self.toasts, &mut self.prompt);
        if let StallAction::Restart { elapsed } = report.stall {
            eprintln!(
                "{}Terminated after {:.1}s; started a fresh session.{}",
                colors::YELLOW,
                elapsed.as_secs_f64(),
                colors::RESET
            );
        }

        if self.toasts.housekeeping(Instant::now()) && self.interactive {
            terminal::show_marker();
        }
    }
}

fn report(err: &pycalc_core::Error) {
    eprintln!("{}{}{}", colors::RED, err.with_hint(), colors::RESET);
}

/// Read stdin on a plain thread; a blocking read must not hold up runtime
/// shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Run the interactive loop until `:quit`, Ctrl-C, or end of input once
/// all work has been delivered.
pub async fn execute(settings: Settings, backend: Arc<dyn SessionBackend>) -> anyhow::Result<()> {
    let commands = Commands::new(settings.preference_store())?;
    let tick_interval = settings.config.tick_interval();
    let toasts = ToastNotifier::new(settings.config.notification);

    let mut session = SessionManager::new(backend, settings.config);
    session.start()?;

    let mut repl = Repl {
        session,
        commands,
        editor: TerminalEditor::new(),
        toasts,
        prompt: TerminalPrompt::new(),
        capture: None,
        interactive: terminal::interactive(),
    };

    if repl.interactive {
        terminal::show_marker();
    }

    let mut lines = spawn_stdin_reader();
    let mut input_open = true;

    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                repl.tick();
                if !input_open && repl.session.is_idle() {
                    break;
                }
            }
            line = lines.recv(), if input_open => match line {
                Some(line) => {
                    if repl.handle_line(&line?) == Flow::Quit {
                        break;
                    }
                    if repl.interactive && !repl.prompt.is_open() {
                        terminal::show_marker();
                    }
                }
                None => {
                    tracing::debug!("End of input");
                    input_open = false;
                    repl.prompt.close_input();
                }
            },
            _ = &mut ctrl_c => {
                tracing::debug!("Interrupted");
                break;
            }
        }
    }

    repl.session.shutdown();
    Ok(())
}
