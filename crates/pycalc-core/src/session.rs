//! The session manager held by the host.
//!
//! Owns the shared state, the live worker and the stall monitor. The host
//! calls [`SessionManager::submit`] on user commands and
//! [`SessionManager::tick`] from its timer; both return promptly.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::dispatch::{DrainReport, StallAction, StallMonitor, StallState, deliver};
use crate::error::{Error, Result};
use crate::execute::WorkerHandle;
use crate::host::{EditorBuffer, Notifier, StallPrompt, TextCodec};
use crate::interpreter::SessionBackend;
use crate::protocol::{EolMode, normalize_eol};
use crate::state::{Generation, PendingCounts, SessionState};
use crate::submit::{self, BufferFormat, Submitted};

/// One interactive session and the worker serving it.
pub struct SessionManager {
    state: Arc<SessionState>,
    backend: Arc<dyn SessionBackend>,
    config: Config,
    worker: Option<WorkerHandle>,
    monitor: StallMonitor,
    restarts: u64,
}

impl SessionManager {
    /// Create a manager; no worker runs until [`start`](Self::start).
    pub fn new(backend: Arc<dyn SessionBackend>, config: Config) -> Self {
        let monitor = StallMonitor::new(config.stall_threshold());
        Self {
            state: Arc::new(SessionState::new()),
            backend,
            config,
            worker: None,
            monitor,
            restarts: 0,
        }
    }

    /// Spawn the first worker.
    ///
    /// Calling it again while a worker is alive does nothing.
    ///
    /// # Errors
    /// Returns [`Error::Spawn`] if the thread cannot be created. The failure
    /// is also recorded as the session fault.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let generation = self.state.generation();
        self.spawn(generation)
    }

    fn spawn(&mut self, generation: Generation) -> Result<()> {
        let options = self.config.session_options();
        match WorkerHandle::spawn(self.state.clone(), self.backend.clone(), options, generation) {
            Ok(worker) => {
                tracing::info!(generation, backend = self.backend.name(), "Spawned worker");
                self.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                tracing::error!(generation, "Could not spawn worker: {}", e);
                self.state.record_fault(generation, e.to_string());
                Err(e)
            }
        }
    }

    /// Queue editor text for evaluation.
    ///
    /// # Errors
    /// See [`submit::submit`].
    pub fn submit(
        &self,
        codec: &dyn TextCodec,
        format: BufferFormat,
        text: &[u8],
        multiline: bool,
    ) -> Result<Submitted> {
        submit::submit(&self.state, codec, format, text, multiline, Instant::now())
    }

    /// One timer tick: drain, deliver, watch for stalls.
    ///
    /// Never blocks on the worker. If the output lock is contended the tick
    /// does nothing and reports itself as skipped.
    pub fn tick(
        &mut self,
        editor: &mut dyn EditorBuffer,
        codec: &dyn TextCodec,
        notifier: &mut dyn Notifier,
        prompt: &mut dyn StallPrompt,
    ) -> DrainReport {
        let now = Instant::now();
        let Some(drained) = self.state.try_drain() else {
            tracing::trace!("Output lock busy, skipping tick");
            return DrainReport::skipped();
        };

        let heartbeat = drained.heartbeat;
        let mut report = deliver(drained, editor, codec, notifier);
        report.stall = self.monitor.tick(now, heartbeat, prompt);

        if let StallAction::Restart { elapsed } = report.stall {
            tracing::warn!(elapsed_secs = elapsed.as_secs(), "Restarting stalled session");
            if let Err(e) = self.restart() {
                notifier.notify(&normalize_eol(&e.with_hint(), EolMode::CrLf));
            }
        }

        report
    }

    /// Cancel whatever is running and replace the worker with a fresh one.
    ///
    /// The old worker is stopped, interrupted and abandoned; all queued input
    /// and undelivered output is discarded.
    ///
    /// # Errors
    /// Returns [`Error::Spawn`] if the replacement cannot be started.
    pub fn restart(&mut self) -> Result<()> {
        self.state.clear_heartbeat();

        let old = self.worker.take();
        if let Some(old) = &old {
            old.request_stop();
            match old.interrupt() {
                Ok(true) => tracing::debug!(generation = old.generation(), "Interrupted worker"),
                Ok(false) => tracing::debug!(generation = old.generation(), "Worker had no session to interrupt"),
                Err(e) => tracing::warn!(generation = old.generation(), "Failed to interrupt worker: {}", e),
            }
        }

        let generation = self.state.reset();
        self.monitor.reset();
        if let Some(old) = old {
            old.abandon();
        }

        self.restarts += 1;
        tracing::info!(generation, restarts = self.restarts, "Session reset");
        self.spawn(generation)
    }

    /// Stop the worker without waiting for it.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.request_stop();
            if let Err(e) = worker.interrupt() {
                tracing::warn!("Failed to interrupt worker on shutdown: {}", e);
            }
            worker.abandon();
            tracing::info!("Session shut down");
        }
    }

    /// No submission is outstanding and no output awaits delivery.
    pub fn is_idle(&self) -> bool {
        let pending = self.state.pending();
        self.state.heartbeat().is_none() && pending.output == 0 && pending.error == 0
    }

    /// Whether a worker has been started and not shut down.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// The setup fault that disabled this session, if any.
    pub fn fault(&self) -> Option<Error> {
        self.state.fault().map(Error::Faulted)
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn generation(&self) -> Generation {
        self.state.generation()
    }

    pub fn pending(&self) -> PendingCounts {
        self.state.pending()
    }

    pub fn stall_state(&self) -> StallState {
        self.monitor.state()
    }

    /// Number of forced restarts so far.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("backend", &self.backend.name())
            .field("worker", &self.worker)
            .field("stall", &self.monitor.state())
            .field("restarts", &self.restarts)
            .finish()
    }
}
