//! Capacity-bounded, thread-safe key/value cache with least-recently-used eviction down
//! to a low-water mark, plus removal listeners for releasing externally held resources.

mod error;
mod memory_cache;

pub use error::CacheError;
pub use memory_cache::{CacheStats, Cacheable, MemoryCache, MemoryCacheListener};
