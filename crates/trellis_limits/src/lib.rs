//! TRELLIS Limitation Handling
//!
//! Detects requests that risk overwhelming the remote system or their own
//! output size, and provides the pure transforms behind the three
//! degraded-service strategies: progressive disclosure, deterministic
//! sampling, and structured fallback. Everything here is synchronous and
//! side-effect free; the runtime decides when to apply it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod strategy;

pub use classify::{
    LimitationDetector, LimitationKind, LimitationRecord, RiskRule, RiskTable, Severity,
    StrategySelection,
};
pub use strategy::{
    collection_items, declared_total, fallback_payload, paginate, sample, sample_payload,
    FallbackGuidance, ProgressivePage, SampleBounds,
};
