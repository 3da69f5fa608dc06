//! The invoker seam.
//!
//! Everything the coordination layer runs goes through this trait. In the
//! full system the single production implementation dispatches each named
//! operation to a REST call; tests substitute a scripted fake. The
//! coordination layer itself never branches on which operations exist.

use crate::error::CoreResult;
use crate::params::Params;
use async_trait::async_trait;

/// Performs one named remote operation
///
/// An `Err` return models an exception in the remote call path and is
/// subject to retry. Domain-level failures that arrive as well-formed
/// payloads are `Ok` values and are not retried.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Invoke the named operation with the given parameters
    ///
    /// # Errors
    ///
    /// Returns error if the remote call fails
    async fn invoke(&self, name: &str, params: &Params) -> CoreResult<serde_json::Value>;
}
