//! Per-tick callback scheduling for interactive hosts.
//!
//! The host calls [`Relay::pump`] once per tick for each [`Phase`]. A relay runs
//! the tasks subscribed to that phase according to its [`DispatchPolicy`]: all
//! of them, a fixed number round-robin, or as many as fit in a time budget.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod global;
pub mod phase;
mod queue;
pub mod scheduler;
pub mod task;
mod wrapper;

pub use config::{DispatchPolicy, PhaseSettings, RelayConfig, SkipPolicy};
pub use dispatch::PumpReport;
pub use error::{ConfigError, RelayError};
pub use phase::Phase;
pub use scheduler::Relay;
pub use task::{Eligibility, FnTask, Task, TaskFlags, TaskHandle};
pub use wrapper::TickTime;
