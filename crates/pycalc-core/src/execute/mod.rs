//! Execution worker for pycalc sessions.
//!
//! # Architecture
//!
//! ```text
//! SessionManager (control thread)
//!     │
//!     └── WorkerHandle
//!             │
//!             ├── StopHandle      cooperative stop, checked once per submission
//!             ├── InterruptSlot   forced interrupt into the running call
//!             │
//!             └── pycalc-worker-<generation> (OS thread)
//!                     │
//!                     ├── wait on pending input
//!                     ├── InterpreterSession::run
//!                     └── publish output/error, clear heartbeat
//! ```
//!
//! A forced restart never joins the old thread. The old worker is
//! abandoned, and whatever it publishes afterwards carries a stale
//! generation and is discarded.
//!
//! # Module Structure
//!
//! - `context` - Stop flag and interrupt slot
//! - `worker` - Worker thread and its handle

mod context;
mod worker;

pub use context::{InterruptSlot, StopHandle};
pub use worker::WorkerHandle;
