//! TRELLIS Result Cache
//!
//! TTL-keyed cache mapping (operation name, canonical parameters) to a
//! previously computed payload. Caching is a performance optimization, not
//! a correctness dependency: a failing backend degrades every read to a
//! miss and every write to a no-op.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod clock;
pub mod entry;
pub mod key;
pub mod pattern;
pub mod store;
pub mod ttl;

pub use backend::{BackendError, CacheBackend, MemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use key::cache_key;
pub use pattern::glob_match;
pub use store::{CacheStats, CacheStore};
pub use ttl::{TtlClass, TtlPolicy};
