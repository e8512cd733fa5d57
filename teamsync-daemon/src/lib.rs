//! Scheduler daemon: a ticker task fires on the configured schedule and a
//! processor task executes one sync run per trigger, never two at once.

mod error;
mod runtime;
pub mod schedule;

pub use error::DaemonError;
pub use runtime::{run, run_until, start_blocking, Dispatch, Job, RunGate};
pub use schedule::Schedule;
