//! TRELLIS Core Types
//!
//! This crate contains pure types with no I/O: operation requests and
//! results, structured parameter maps with canonical serialization, and
//! the abstract `Invoker` seam the rest of the workspace executes through.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod invoker;
pub mod params;
pub mod request;
pub mod result;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use invoker::Invoker;
pub use params::Params;
pub use request::OperationRequest;
pub use result::{Degradation, OperationResult};
