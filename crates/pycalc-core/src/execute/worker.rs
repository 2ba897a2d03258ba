//! The execution worker thread.
//!
//! Provides `WorkerHandle` for spawning a worker that owns one interpreter
//! session, and for stopping, interrupting or abandoning it from the control
//! thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::interpreter::{Captured, InterpreterSession, SessionBackend, SessionOptions};
use crate::protocol::{EolMode, Submission, normalize_eol};
use crate::state::{Generation, SessionState};

use super::context::{InterruptSlot, StopHandle};

/// Handle to a worker thread.
///
/// Dropping the handle requests a cooperative stop but never waits for the
/// thread; a worker stuck in a call keeps running until that call returns
/// or is interrupted.
pub struct WorkerHandle {
    /// Generation this worker publishes under.
    generation: Generation,
    /// Shared state, kept to wake the worker on stop.
    state: Arc<SessionState>,
    /// Cooperative stop flag.
    stop: StopHandle,
    /// Interrupter of the worker's session, once opened.
    interrupt: InterruptSlot,
    /// The OS thread; `None` once joined.
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn a worker thread for `generation`.
    ///
    /// The session is opened on the new thread. If that fails the fault is
    /// recorded in `state` and the thread exits.
    pub fn spawn(
        state: Arc<SessionState>,
        backend: Arc<dyn SessionBackend>,
        options: SessionOptions,
        generation: Generation,
    ) -> Result<Self> {
        let stop = StopHandle::new();
        let interrupt = InterruptSlot::new();

        let worker = Worker {
            state: state.clone(),
            backend,
            options,
            generation,
            stop: stop.clone(),
            interrupt: interrupt.clone(),
        };

        let thread = thread::Builder::new()
            .name(format!("pycalc-worker-{generation}"))
            .spawn(move || worker.run())
            .map_err(Error::Spawn)?;

        Ok(Self {
            generation,
            state,
            stop,
            interrupt,
            thread: Some(thread),
        })
    }

    /// Generation this worker publishes under.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Ask the worker to exit before its next submission.
    pub fn request_stop(&self) {
        self.stop.request_stop();
        self.state.wake_waiters();
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Force the worker's running call to abort.
    ///
    /// Returns `Ok(false)` if the worker has no open session.
    pub fn interrupt(&self) -> Result<bool> {
        self.interrupt.interrupt()
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the worker and wait for its thread to exit.
    ///
    /// Blocks for as long as the current call runs; only use it once the
    /// worker is known to be idle or interrupted.
    pub fn join(mut self) -> Result<()> {
        self.request_stop();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|payload| Error::Interpreter(panic_message(payload.as_ref()))),
            None => Ok(()),
        }
    }

    /// Detach from the worker without waiting for it.
    pub fn abandon(mut self) {
        self.request_stop();
        if self.thread.take().is_some() {
            tracing::debug!(generation = self.generation, "Worker abandoned");
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if !self.stop.is_stopped() {
            self.request_stop();
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("generation", &self.generation)
            .field("stopped", &self.stop.is_stopped())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// State moved onto the worker thread.
struct Worker {
    state: Arc<SessionState>,
    backend: Arc<dyn SessionBackend>,
    options: SessionOptions,
    generation: Generation,
    stop: StopHandle,
    interrupt: InterruptSlot,
}

impl Worker {
    fn run(self) {
        let generation = self.generation;
        let mut session = match self.backend.open(&self.options) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(generation, backend = self.backend.name(), "Session setup failed: {}", e);
                self.state.record_fault(generation, e.to_string());
                return;
            }
        };

        self.interrupt.install(session.interrupter());
        tracing::info!(generation, backend = self.backend.name(), "Worker started");

        while !self.stop.is_stopped() {
            let Some(wire) = self.state.wait_input(&self.stop) else {
                break;
            };

            let captured = execute(session.as_mut(), &wire);
            if !self
                .state
                .publish(generation, captured.output, captured.error, Instant::now())
            {
                tracing::warn!(generation, "Discarded output of a replaced worker");
            }
        }

        self.interrupt.clear();
        tracing::info!(generation, "Worker stopped");
    }
}

/// Decode and run one queue item, turning every failure into error text.
fn execute(session: &mut dyn InterpreterSession, wire: &str) -> Captured {
    let submission = match Submission::decode(wire) {
        Ok(submission) => submission,
        Err(e) => {
            tracing::warn!("Rejected queue item: {}", e);
            return Captured::error(format!("{e}\n"));
        }
    };

    tracing::debug!(
        multiline = submission.multiline,
        bytes = submission.code.len(),
        "Executing submission"
    );

    let source = normalize_eol(submission.source(), EolMode::Lf);
    panic::catch_unwind(AssertUnwindSafe(|| session.run(&source, submission.multiline)))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!("Interpreter session panicked: {}", message);
            Captured::error(format!("internal error: {message}\n"))
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
