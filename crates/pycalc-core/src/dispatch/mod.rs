//! The host-side drain tick and the stall monitor it feeds.
//!
//! Everything here runs on the host's control thread and never blocks: the
//! output queues are taken with a non-blocking lock and a contended tick is
//! simply skipped.

mod drain;
mod stall;

pub use drain::{DrainReport, deliver};
pub use stall::{PromptAnswer, StallAction, StallMonitor, StallState};
