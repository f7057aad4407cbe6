//! Response caching for paged listings.

pub mod keys;
mod lock;
pub mod read_through;
pub mod store;

pub use keys::{CacheKey, CacheKeyBuilder, KeyRequest};
pub use read_through::ReadThroughCache;
pub use store::{CacheError, CacheStore, MemoryCache};
