//! TRELLIS Runtime
//!
//! Runs resolved batches against the abstract invoker: parallel batches
//! under a bounded semaphore and a process-wide rate limiter, dependent
//! chains with result-derived context propagation, exponential-backoff
//! retry, and the `Coordinator` facade tying resolution, caching, and
//! limitation handling together.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod coordinator;
pub mod executor;
pub mod monitor;
pub mod rate;
pub mod stats;

pub use context::{ContextRule, ContextRules};
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use executor::{Executor, ExecutorConfig};
pub use monitor::{RoundMonitor, RoundSummary};
pub use rate::RateLimiter;
pub use stats::{CoordinationStats, RoundTally, StatsHandle};
