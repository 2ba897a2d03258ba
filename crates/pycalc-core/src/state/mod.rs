//! Shared session state.
//!
//! The state is split into two lock domains so that a slow drain never delays
//! a new submission and enqueueing a submission never waits on a drain:
//!
//! ```text
//!   input side  (Mutex + Condvar)          output side (Mutex)
//!   ┌─────────────────────────┐            ┌──────────────────────────┐
//!   │ pending input (wire)    │            │ pending output  (tagged) │
//!   │ not-empty condition     │            │ pending error   (tagged) │
//!   └─────────────────────────┘            │ heartbeat, generation    │
//!                                          │ setup fault              │
//!                                          └──────────────────────────┘
//! ```
//!
//! When both locks are needed (enqueue, publish, reset) the output side is
//! taken first. The worker only ever holds the input lock while waiting.

mod queues;

pub use queues::{Drained, Generation, PendingCounts, SessionState, Tagged};
