//! TRELLIS Dependency Resolver
//!
//! Converts a round of operation requests into an ordered sequence of
//! batches, each batch executable in parallel. Malformed graphs (cycles,
//! dangling references) are recovered by forcing the remainder into a final
//! batch and surfacing inspectable warnings; they never abort a round.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod estimate;
pub mod resolver;

pub use estimate::DurationEstimates;
pub use resolver::{DependencyResolver, ResolveMeta, ResolveWarning, ResolvedPlan};
