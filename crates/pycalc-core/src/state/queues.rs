//! Pending-input and pending-output queues with their synchronization.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::execute::StopHandle;

/// Identifies which worker instance produced a queue item.
///
/// Advanced on every reset; items carrying an older generation belong to an
/// abandoned session and are never delivered.
pub type Generation = u64;

/// A queue item tagged with the generation of the worker that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged {
    pub generation: Generation,
    pub text: String,
}

/// Everything moved out of the output side by one drain.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Drained {
    /// Normal output items, in production order.
    pub output: Vec<String>,
    /// Error output items, in production order.
    pub error: Vec<String>,
    /// Heartbeat observed under the same lock.
    pub heartbeat: Option<Instant>,
    /// Setup fault, handed out exactly once.
    pub fault: Option<String>,
    /// Items discarded because they carried a stale generation.
    pub stale: usize,
}

/// Snapshot of queue lengths.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PendingCounts {
    pub input: usize,
    pub output: usize,
    pub error: usize,
}

impl PendingCounts {
    /// Whether all three queues are empty.
    pub fn is_empty(&self) -> bool {
        self.input == 0 && self.output == 0 && self.error == 0
    }
}

#[derive(Debug, Default)]
struct OutputSide {
    output: VecDeque<Tagged>,
    error: VecDeque<Tagged>,
    heartbeat: Option<Instant>,
    generation: Generation,
    fault: Option<String>,
    fault_reported: bool,
}

/// Session state shared by the submission path, the worker and the drain.
#[derive(Debug, Default)]
pub struct SessionState {
    input: Mutex<VecDeque<String>>,
    input_ready: Condvar,
    output: Mutex<OutputSide>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionState {
    /// Create empty state at generation zero.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Input side
    // =========================================================================

    /// Enqueue an encoded submission and wake the worker.
    pub fn push_input(&self, wire: String) {
        lock(&self.input).push_back(wire);
        self.input_ready.notify_all();
    }

    /// Block until a submission is available or `stop` is requested.
    ///
    /// Returns `None` once stopped; a stopped worker never pops.
    pub fn wait_input(&self, stop: &StopHandle) -> Option<String> {
        let guard = lock(&self.input);
        let mut queue = self
            .input_ready
            .wait_while(guard, |queue| queue.is_empty() && !stop.is_stopped())
            .unwrap_or_else(PoisonError::into_inner);

        if stop.is_stopped() {
            return None;
        }
        queue.pop_front()
    }

    /// Enqueue a submission and arm the heartbeat if none is running.
    ///
    /// Both happen under the output lock, so a worker publishing the previous
    /// submission either sees this one queued and re-arms, or clears first
    /// and this call arms. Returns whether this call armed the heartbeat.
    ///
    /// # Errors
    /// Returns [`Error::Faulted`] once a setup fault has been recorded.
    pub fn enqueue(&self, wire: String, now: Instant) -> Result<bool> {
        let mut side = lock(&self.output);
        if let Some(fault) = &side.fault {
            return Err(Error::Faulted(fault.clone()));
        }

        lock(&self.input).push_back(wire);
        self.input_ready.notify_all();

        let armed = side.heartbeat.is_none();
        if armed {
            side.heartbeat = Some(now);
        }
        Ok(armed)
    }

    /// Wake every thread waiting for input so it can observe a stop request.
    ///
    /// The input lock is taken first so a waiter cannot miss the wakeup
    /// between checking its predicate and going to sleep.
    pub fn wake_waiters(&self) {
        let _guard = lock(&self.input);
        self.input_ready.notify_all();
    }

    // =========================================================================
    // Output side
    // =========================================================================

    /// Set the heartbeat unless one is already running.
    ///
    /// Returns `true` if this call armed it.
    pub fn arm_heartbeat(&self, now: Instant) -> bool {
        let mut side = lock(&self.output);
        if side.heartbeat.is_some() {
            return false;
        }
        side.heartbeat = Some(now);
        true
    }

    /// Clear the heartbeat unconditionally.
    pub fn clear_heartbeat(&self) {
        lock(&self.output).heartbeat = None;
    }

    /// Current heartbeat.
    pub fn heartbeat(&self) -> Option<Instant> {
        lock(&self.output).heartbeat
    }

    /// Publish the captured text of one submission and clear the heartbeat.
    ///
    /// If more submissions are already queued the heartbeat is re-armed at
    /// `now`, so the next one is still covered by stall detection.
    ///
    /// Returns `false` without touching the queues or the heartbeat when
    /// `generation` is no longer current.
    pub fn publish(&self, generation: Generation, output: String, error: String, now: Instant) -> bool {
        let mut side = lock(&self.output);
        if side.generation != generation {
            return false;
        }

        side.output.push_back(Tagged {
            generation,
            text: output,
        });
        side.error.push_back(Tagged {
            generation,
            text: error,
        });
        side.heartbeat = if lock(&self.input).is_empty() {
            None
        } else {
            Some(now)
        };
        true
    }

    /// Record a fatal setup failure of the worker at `generation`.
    pub fn record_fault(&self, generation: Generation, message: String) {
        let mut side = lock(&self.output);
        if side.generation == generation && side.fault.is_none() {
            side.fault = Some(message);
            side.heartbeat = None;
        }
    }

    /// The recorded setup fault, if any.
    pub fn fault(&self) -> Option<String> {
        lock(&self.output).fault.clone()
    }

    /// Current generation.
    pub fn generation(&self) -> Generation {
        lock(&self.output).generation
    }

    /// Move out everything available without blocking.
    ///
    /// Returns `None` when the output lock is held elsewhere; the caller
    /// simply tries again on its next tick.
    pub fn try_drain(&self) -> Option<Drained> {
        let mut side = match self.output.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };

        let generation = side.generation;
        let mut drained = Drained {
            heartbeat: side.heartbeat,
            ..Drained::default()
        };

        for item in side.output.drain(..) {
            if item.generation == generation {
                drained.output.push(item.text);
            } else {
                drained.stale += 1;
            }
        }
        for item in side.error.drain(..) {
            if item.generation == generation {
                drained.error.push(item.text);
            } else {
                drained.stale += 1;
            }
        }

        if !side.fault_reported && side.fault.is_some() {
            side.fault_reported = true;
            drained.fault = side.fault.clone();
        }

        Some(drained)
    }

    /// Discard all three queues, the heartbeat and any setup fault, and
    /// advance the generation.
    ///
    /// Returns the new generation, which the replacement worker must carry.
    pub fn reset(&self) -> Generation {
        let mut side = lock(&self.output);
        let mut input = lock(&self.input);

        input.clear();
        side.output.clear();
        side.error.clear();
        side.heartbeat = None;
        side.fault = None;
        side.fault_reported = false;
        side.generation += 1;
        side.generation
    }

    /// Lengths of the three queues.
    pub fn pending(&self) -> PendingCounts {
        let side = lock(&self.output);
        let input = lock(&self.input);
        PendingCounts {
            input: input.len(),
            output: side.output.len(),
            error: side.error.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_input_is_fifo() {
        let state = SessionState::new();
        let stop = StopHandle::new();
        state.push_input("0a\n".to_string());
        state.push_input("0b\n".to_string());

        assert_eq!(state.wait_input(&stop).as_deref(), Some("0a\n"));
        assert_eq!(state.wait_input(&stop).as_deref(), Some("0b\n"));
    }

    #[test]
    fn test_wait_input_wakes_on_push() {
        let state = Arc::new(SessionState::new());
        let stop = StopHandle::new();

        let waiter = {
            let state = state.clone();
            let stop = stop.clone();
            thread::spawn(move || state.wait_input(&stop))
        };

        thread::sleep(Duration::from_millis(20));
        state.push_input("1print(1)\n".to_string());
        assert_eq!(waiter.join().unwrap().as_deref(), Some("1print(1)\n"));
    }

    #[test]
    fn test_wait_input_wakes_on_stop() {
        let state = Arc::new(SessionState::new());
        let stop = StopHandle::new();

        let waiter = {
            let state = state.clone();
            let stop = stop.clone();
            thread::spawn(move || state.wait_input(&stop))
        };

        thread::sleep(Duration::from_millis(20));
        stop.request_stop();
        state.wake_waiters();
        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn test_stopped_waiter_leaves_input_queued() {
        let state = SessionState::new();
        let stop = StopHandle::new();
        stop.request_stop();
        state.push_input("0x = 1\n".to_string());

        assert_eq!(state.wait_input(&stop), None);
        assert_eq!(state.pending().input, 1);
    }

    #[test]
    fn test_enqueue_arms_heartbeat_only_when_idle() {
        let state = SessionState::new();
        let first = Instant::now();

        assert!(state.enqueue("0x = 1\n".to_string(), first).unwrap());
        assert!(!state.enqueue("0y = 2\n".to_string(), first + Duration::from_secs(1)).unwrap());
        assert_eq!(state.heartbeat(), Some(first));
        assert_eq!(state.pending().input, 2);
    }

    #[test]
    fn test_enqueue_rejected_after_fault() {
        let state = SessionState::new();
        state.record_fault(0, "no interpreter".to_string());

        let result = state.enqueue("0x = 1\n".to_string(), Instant::now());
        assert!(matches!(result, Err(Error::Faulted(_))));
        assert!(state.pending().is_empty());
        assert_eq!(state.heartbeat(), None);
    }

    #[test]
    fn test_heartbeat_armed_once() {
        let state = SessionState::new();
        let first = Instant::now();
        assert!(state.arm_heartbeat(first));
        assert!(!state.arm_heartbeat(first + Duration::from_secs(1)));
        assert_eq!(state.heartbeat(), Some(first));
    }

    #[test]
    fn test_publish_clears_heartbeat() {
        let state = SessionState::new();
        state.arm_heartbeat(Instant::now());
        assert!(state.publish(0, "5\n".to_string(), String::new(), Instant::now()));
        assert_eq!(state.heartbeat(), None);

        let drained = state.try_drain().unwrap();
        assert_eq!(drained.output, vec!["5\n".to_string()]);
        assert_eq!(drained.error, vec![String::new()]);
    }

    #[test]
    fn test_publish_rearms_heartbeat_when_more_input_is_queued() {
        let state = SessionState::new();
        let submitted = Instant::now();
        state.arm_heartbeat(submitted);
        state.push_input("0while True: pass\n".to_string());

        let finished = submitted + Duration::from_millis(5);
        assert!(state.publish(0, String::new(), String::new(), finished));
        assert_eq!(state.heartbeat(), Some(finished));
    }

    #[test]
    fn test_stale_publish_is_refused() {
        let state = SessionState::new();
        let generation = state.reset();
        state.arm_heartbeat(Instant::now());

        assert!(!state.publish(generation - 1, "garbage".to_string(), String::new(), Instant::now()));
        assert!(state.heartbeat().is_some());
        assert!(state.pending().is_empty());
    }

    #[test]
    fn test_drain_on_empty_queues_is_noop() {
        let state = SessionState::new();
        for _ in 0..3 {
            let drained = state.try_drain().unwrap();
            assert_eq!(drained, Drained::default());
        }
    }

    #[test]
    fn test_drain_skips_when_output_lock_is_held() {
        let state = SessionState::new();
        let _held = state.output.lock().unwrap();
        assert!(state.try_drain().is_none());
    }

    #[test]
    fn test_reset_clears_everything_and_advances_generation() {
        let state = SessionState::new();
        state.push_input("0while True: pass\n".to_string());
        state.publish(0, "a".to_string(), "b".to_string(), Instant::now());
        state.arm_heartbeat(Instant::now());

        assert_eq!(state.reset(), 1);
        assert!(state.pending().is_empty());
        assert_eq!(state.heartbeat(), None);
        assert_eq!(state.generation(), 1);
    }

    #[test]
    fn test_fault_reported_once() {
        let state = SessionState::new();
        state.record_fault(0, "no interpreter".to_string());

        assert_eq!(state.try_drain().unwrap().fault.as_deref(), Some("no interpreter"));
        assert_eq!(state.try_drain().unwrap().fault, None);
        assert_eq!(state.fault().as_deref(), Some("no interpreter"));
    }

    #[test]
    fn test_stale_fault_is_ignored() {
        let state = SessionState::new();
        state.reset();
        state.record_fault(0, "old worker".to_string());
        assert_eq!(state.fault(), None);
    }

    #[test]
    fn test_reset_lifts_fault() {
        let state = SessionState::new();
        state.record_fault(0, "no interpreter".to_string());
        assert!(state.try_drain().unwrap().fault.is_some());

        let generation = state.reset();
        assert_eq!(state.fault(), None);
        assert!(state.enqueue("0x = 1\n".to_string(), Instant::now()).unwrap());

        // A fault of the replacement is reported again.
        state.record_fault(generation, "still no interpreter".to_string());
        assert_eq!(state.try_drain().unwrap().fault.as_deref(), Some("still no interpreter"));
    }
}
