//! Multi-tier cache for serialized topic lists.
//!
//! Keys join a viewer namespace with the slug and the request's
//! discriminating inputs (`keys`); per-slug TTLs and the civil-day
//! freshness rule live in `policy`; `store` provides the backend trait and
//! an in-memory LRU implementation.

pub mod keys;
pub(crate) mod lock;
pub mod policy;
mod store;

pub use store::{CacheError, CachedRows, MemoryCache, TopicListCache};
