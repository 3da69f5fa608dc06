//! Pure transforms behind the degradation strategies.
//!
//! All functions here are deterministic: the same inputs always produce
//! the same page or sample, so degraded results are reproducible and
//! cursor replay is idempotent.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Extract the item list from a collection payload
///
/// Accepts a bare JSON array or the common envelope shape
/// `{"count": n, "results": [...]}`.
#[must_use]
pub fn collection_items(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get("results").and_then(Value::as_array),
        _ => None,
    }
}

/// Total collection size declared by the payload, if any
#[must_use]
pub fn declared_total(payload: &Value) -> Option<usize> {
    payload
        .as_object()
        .and_then(|map| map.get("count"))
        .and_then(Value::as_u64)
        .map(|count| count as usize)
}

/// One bounded page of a larger collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressivePage {
    /// Items on this page
    pub items: Vec<Value>,
    /// Offset this page starts at
    pub offset: usize,
    /// Configured page size
    pub page_size: usize,
    /// Cursor for the next page; `None` when the collection is exhausted
    pub next_cursor: Option<usize>,
    /// Estimated total collection size
    pub total_estimate: usize,
    /// Estimated items remaining after this page
    pub remaining: usize,
}

impl ProgressivePage {
    /// Render the page as a degraded payload
    #[must_use]
    pub fn to_payload(&self) -> Value {
        json!({
            "degraded": "progressive_disclosure",
            "items": self.items,
            "offset": self.offset,
            "page_size": self.page_size,
            "next_cursor": self.next_cursor,
            "total_estimate": self.total_estimate,
            "remaining": self.remaining,
        })
    }
}

/// Slice one page out of a collection
///
/// `total_estimate` overrides the local item count when the payload
/// declared a larger collection (the items may already be a remote page).
/// Replaying the same offset over the same items returns the same page.
#[must_use]
pub fn paginate(
    items: &[Value],
    offset: usize,
    page_size: usize,
    total_estimate: Option<usize>,
) -> ProgressivePage {
    let page_size = page_size.max(1);
    let start = offset.min(items.len());
    let end = (start + page_size).min(items.len());
    let page: Vec<Value> = items[start..end].to_vec();

    let total = total_estimate.unwrap_or(items.len());
    let consumed = offset + page.len();
    let remaining = total.saturating_sub(consumed);
    let next_cursor = if remaining > 0 { Some(consumed) } else { None };

    ProgressivePage {
        items: page,
        offset,
        page_size,
        next_cursor,
        total_estimate: total,
        remaining,
    }
}

/// Bounds for deterministic sampling
///
/// The sample size is `min(upper, max(lower, total / divisor))`, capped at
/// the candidate count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBounds {
    /// Divisor applied to the candidate count
    pub divisor: usize,
    /// Minimum sample size
    pub lower: usize,
    /// Maximum sample size
    pub upper: usize,
}

impl SampleBounds {
    /// Sample size for a candidate count
    #[must_use]
    pub fn size_for(&self, total: usize) -> usize {
        let divisor = self.divisor.max(1);
        (total / divisor).max(self.lower).min(self.upper).min(total)
    }
}

impl Default for SampleBounds {
    fn default() -> Self {
        Self {
            divisor: 10,
            lower: 5,
            upper: 20,
        }
    }
}

/// Select a deterministic, evenly-spaced subset of the candidates
///
/// No randomness: identical candidates and bounds always yield the
/// identical sample.
#[must_use]
pub fn sample(items: &[Value], bounds: SampleBounds) -> Vec<Value> {
    let size = bounds.size_for(items.len());
    if size == 0 {
        return Vec::new();
    }
    if size >= items.len() {
        return items.to_vec();
    }

    (0..size)
        .map(|i| items[i * items.len() / size].clone())
        .collect()
}

/// Render a sample as a degraded payload
#[must_use]
pub fn sample_payload(sampled: &[Value], total: usize) -> Value {
    json!({
        "degraded": "sampling",
        "items": sampled,
        "sample_size": sampled.len(),
        "total": total,
        "note": "evenly-spaced representative subset; re-run with an explicit limit for the full set",
    })
}

/// Structured explanation returned instead of raw data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackGuidance {
    /// Why direct execution was not attempted
    pub reason: String,
    /// Fixed menu of alternative next actions
    pub alternatives: Vec<String>,
}

impl FallbackGuidance {
    /// Create guidance with the standard alternatives menu
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            alternatives: vec![
                "narrow the query with a filter parameter".to_string(),
                "supply an explicit result limit".to_string(),
                "split the request into smaller batches".to_string(),
            ],
        }
    }

    /// Replace the alternatives menu
    #[must_use]
    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.alternatives = alternatives;
        self
    }
}

/// Render fallback guidance as a degraded payload
///
/// Always labeled; never partial data posing as a full result.
#[must_use]
pub fn fallback_payload(guidance: &FallbackGuidance) -> Value {
    json!({
        "degraded": "fallback",
        "reason": guidance.reason,
        "alternatives": guidance.alternatives,
    })
}
