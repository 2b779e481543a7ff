//! A bounded, expiration-aware local cache with an optional write-behind
//! remote tier, a chained observation hook pipeline, and atomic statistics.

pub mod element;
pub mod error;
pub mod hook;
pub mod l2;
pub mod lru;
pub mod serializer;
pub mod shared_lru;
pub mod stats;
pub mod tiered;

pub use element::Element;
pub use error::CacheError;
pub use hook::{HookChain, HookContext, HookHandler};
pub use l2::{RedisStore, RemoteStore};
pub use lru::LruCache;
pub use serializer::{JsonSerializer, Serializer};
pub use shared_lru::SharedLru;
pub use stats::{Stats, StatsSnapshot};
pub use tiered::{TieredCache, TieredCacheBuilder};
