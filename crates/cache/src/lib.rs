//! Generation cache: request-derived keys, a TTL'd in-process tier and a
//! best-effort durable tier.

mod cache;
mod clock;
mod entry;
mod key;
mod storage;

pub use cache::{CacheConfig, CacheStats, GenerationCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, IndexRecord};
pub use key::{CacheKey, InvalidKey, derive_key, derive_key_for};
pub use storage::{CacheStorage, FileStorage, MemoryStorage, StorageError};
