//! Cancellation handles for the execution worker.
//!
//! Cancellation has two tiers: a cooperative stop flag checked once per loop
//! iteration, and a forced interrupt delivered into the running call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::interpreter::Interrupt;

/// Handle for cooperative cancellation of the worker loop.
///
/// `StopHandle` can be cloned and shared across threads; a stop requested
/// through any clone is visible to all of them.
///
/// # Example
///
/// ```
/// use pycalc_core::execute::StopHandle;
///
/// let handle = StopHandle::new();
/// let handle_clone = handle.clone();
///
/// assert!(!handle.is_stopped());
///
/// handle_clone.request_stop();
///
/// assert!(handle.is_stopped());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    /// Create a new stop handle.
    pub fn new() -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Request the worker loop to exit at its next check.
    ///
    /// This does not interrupt a call already in progress; see
    /// [`InterruptSlot`] for that.
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Thread-safe slot holding the interrupter of the worker's live session.
///
/// The worker installs the interrupter once its session is open, so the
/// control thread can abort the running call without any lock the worker
/// holds during execution.
#[derive(Clone, Default)]
pub struct InterruptSlot {
    inner: Arc<Mutex<Option<Arc<dyn Interrupt>>>>,
}

impl InterruptSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the interrupter of a freshly opened session.
    pub fn install(&self, interrupter: Arc<dyn Interrupt>) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(interrupter);
    }

    /// Remove the interrupter once the session is gone.
    pub fn clear(&self) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether a session is currently reachable.
    pub fn is_installed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Deliver a forced interrupt into the running call.
    ///
    /// Returns `Ok(false)` if no session was installed (the worker is still
    /// starting or already gone).
    pub fn interrupt(&self) -> Result<bool> {
        // Clone out so the slot lock is not held across the interpreter call.
        let interrupter = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match interrupter {
            Some(interrupter) => {
                interrupter.interrupt()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for InterruptSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptSlot")
            .field("installed", &self.is_installed())
            .finish()
    }
}
