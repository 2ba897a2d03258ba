//! A tiny deterministic interpreter.
//!
//! Understands just enough statements to drive the worker, drain and stall
//! logic end to end without embedding Python:
//!
//! | statement        | effect                                              |
//! |------------------|-----------------------------------------------------|
//! | `name = value`   | bind `value` (literal or another name)              |
//! | `print(value)`   | write the value and a newline to output             |
//! | `value`          | echo the value, like an interactive prompt          |
//! | `fail(message)`  | write `Error: message` to error                     |
//! | `sleep(ms)`      | sleep, interruptible                                |
//! | `spin()`         | loop until interrupted                              |
//! | `panic()`        | panic inside the session                            |
//! | `repeat N:`      | open a block; its body runs N times on a blank line |
//!
//! Unknown names raise `NameError`; an interrupt surfaces as
//! `KeyboardInterrupt`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

use super::{Captured, Interrupt, InterpreterSession, SessionBackend, SessionOptions, is_echo};

const POLL_STEP: Duration = Duration::from_millis(1);

/// Backend producing [`ScriptedSession`]s.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    opened: Arc<AtomicUsize>,
    open_error: Option<String>,
}

impl ScriptedBackend {
    /// A backend whose sessions always open.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose sessions fail to open with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            opened: Arc::default(),
            open_error: Some(message.into()),
        }
    }

    /// Number of sessions opened so far, across clones.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl SessionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open(&self, options: &SessionOptions) -> Result<Box<dyn InterpreterSession>> {
        if let Some(message) = &self.open_error {
            return Err(Error::Interpreter(message.clone()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession::new(*options)))
    }
}

#[derive(Debug, Default)]
struct InterruptFlag(AtomicBool);

impl InterruptFlag {
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

impl Interrupt for InterruptFlag {
    fn interrupt(&self) -> Result<()> {
        self.0.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Block {
    count: usize,
    body: Vec<String>,
}

/// Raised while executing a statement; rendered into the error text.
struct Raised(String);

/// One persistent scripted session.
pub struct ScriptedSession {
    options: SessionOptions,
    vars: HashMap<String, String>,
    block: Option<Block>,
    interrupted: Arc<InterruptFlag>,
}

impl ScriptedSession {
    fn new(options: SessionOptions) -> Self {
        Self {
            options,
            vars: HashMap::new(),
            block: None,
            interrupted: Arc::default(),
        }
    }

    fn value(&self, token: &str) -> std::result::Result<String, Raised> {
        let token = token.trim();
        if token.parse::<i64>().is_ok() {
            return Ok(token.to_string());
        }
        if let Some(text) = token
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
        {
            return Ok(text.to_string());
        }
        self.vars
            .get(token)
            .cloned()
            .ok_or_else(|| Raised(format!("NameError: name '{token}' is not defined")))
    }

    fn wait(&self, deadline: Option<Instant>) -> std::result::Result<(), Raised> {
        loop {
            if self.interrupted.take() {
                return Err(Raised("KeyboardInterrupt".to_string()));
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(());
            }
            thread::sleep(POLL_STEP);
        }
    }

    fn statement(&mut self, line: &str, out: &mut String) -> std::result::Result<(), Raised> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        if let Some(arg) = call_arg(line, "print") {
            let value = self.value(arg)?;
            out.push_str(&value);
            out.push('\n');
        } else if let Some(arg) = call_arg(line, "fail") {
            return Err(Raised(format!("Error: {}", arg.trim())));
        } else if let Some(arg) = call_arg(line, "sleep") {
            let millis = arg
                .trim()
                .parse::<u64>()
                .map_err(|_| Raised(format!("ValueError: invalid duration {arg:?}")))?;
            self.wait(Some(Instant::now() + Duration::from_millis(millis)))?;
        } else if line == "spin()" {
            self.wait(None)?;
        } else if line == "panic()" {
            panic!("scripted session panicked");
        } else if let Some((name, value)) = line.split_once('=') {
            let value = self.value(value)?;
            self.vars.insert(name.trim().to_string(), value);
        } else {
            let value = self.value(line)?;
            out.push_str(&value);
            out.push('\n');
        }
        Ok(())
    }

    fn run_block(&mut self, block: &Block, out: &mut String) -> std::result::Result<(), Raised> {
        for _ in 0..block.count {
            for line in &block.body {
                self.statement(line, out)?;
            }
        }
        Ok(())
    }

    fn execute(&mut self, lines: &[&str], out: &mut String) -> std::result::Result<(), Raised> {
        let mut index = 0;
        while index < lines.len() {
            let line = lines[index];
            index += 1;
            match repeat_header(line)? {
                Some(count) => {
                    let mut body = Vec::new();
                    while index < lines.len() && lines[index].starts_with([' ', '\t']) {
                        body.push(lines[index].to_string());
                        index += 1;
                    }
                    self.run_block(&Block { count, body }, out)?;
                }
                None => self.statement(line, out)?,
            }
        }
        Ok(())
    }

    fn push_line(&mut self, line: &str, out: &mut String) -> std::result::Result<(), Raised> {
        if let Some(block) = self.block.as_mut() {
            if !line.trim().is_empty() {
                block.body.push(line.to_string());
                return Ok(());
            }
            if let Some(block) = self.block.take() {
                return self.run_block(&block, out);
            }
        }

        match repeat_header(line)? {
            Some(count) => {
                self.block = Some(Block {
                    count,
                    body: Vec::new(),
                });
                Ok(())
            }
            None => self.statement(line, out),
        }
    }
}

impl InterpreterSession for ScriptedSession {
    fn run(&mut self, source: &str, multiline: bool) -> Captured {
        let mut captured = Captured::default();

        let result = if multiline {
            self.block = None;
            let lines: Vec<&str> = source.lines().collect();
            self.execute(&lines, &mut captured.output)
        } else {
            self.push_line(source, &mut captured.output)
        };

        if let Err(Raised(message)) = result {
            captured.error = format!("Traceback (most recent call last):\n{message}\n");
        }

        if !multiline && self.options.echo_suppression && is_echo(source, &captured.output) {
            captured.output.clear();
        }
        captured
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        self.interrupted.clone()
    }
}

fn call_arg<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    line.strip_prefix(name)?.strip_prefix('(')?.strip_suffix(')')
}

fn repeat_header(line: &str) -> std::result::Result<Option<usize>, Raised> {
    let Some(count) = line
        .trim()
        .strip_prefix("repeat ")
        .and_then(|rest| rest.strip_suffix(':'))
    else {
        return Ok(None);
    };
    count
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| Raised(format!("SyntaxError: invalid repeat count {count:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Box<dyn InterpreterSession> {
        ScriptedBackend::new().open(&SessionOptions::default()).unwrap()
    }

    #[test]
    fn test_variables_persist_across_runs() {
        let mut session = session();
        assert_eq!(session.run("x = 5", false), Captured::default());
        assert_eq!(session.run("print(x)", false).output, "5\n");
    }

    #[test]
    fn test_unknown_name_is_rendered_as_error() {
        let mut session = session();
        let captured = session.run("print(y)", false);
        assert!(captured.output.is_empty());
        assert!(captured.error.contains("NameError: name 'y' is not defined"));
    }

    #[test]
    fn test_multiline_runs_indented_block() {
        let mut session = session();
        let captured = session.run("n = 7\nrepeat 3:\n    print(n)", true);
        assert_eq!(captured.output, "7\n7\n7\n");
    }

    #[test]
    fn test_single_line_block_waits_for_blank_line() {
        let mut session = session();
        assert_eq!(session.run("repeat 2:", false), Captured::default());
        assert_eq!(session.run("    print(1)", false), Captured::default());
        assert_eq!(session.run("", false).output, "1\n1\n");
    }

    #[test]
    fn test_multiline_discards_open_block() {
        let mut session = session();
        session.run("repeat 2:", false);
        assert_eq!(session.run("print(3)", true).output, "3\n");
        assert_eq!(session.run("print(4)", false).output, "4\n");
    }

    #[test]
    fn test_echo_suppressed_only_when_enabled() {
        let mut quiet = session();
        assert_eq!(quiet.run("5", false).output, "");

        let mut chatty = ScriptedBackend::new()
            .open(&SessionOptions {
                echo_suppression: false,
            })
            .unwrap();
        assert_eq!(chatty.run("5", false).output, "5\n");
    }

    #[test]
    fn test_interrupt_breaks_spin() {
        let mut session = session();
        let interrupter = session.interrupter();

        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            interrupter.interrupt().unwrap();
        });

        let captured = session.run("spin()", false);
        trigger.join().unwrap();
        assert!(captured.error.contains("KeyboardInterrupt"));
    }

    #[test]
    fn test_failing_backend_counts_nothing() {
        let backend = ScriptedBackend::failing("no runtime");
        assert!(matches!(
            backend.open(&SessionOptions::default()),
            Err(Error::Interpreter(_))
        ));
        assert_eq!(backend.opened(), 0);
    }
}
