//! Cache backends behind one storage contract.
//!
//! - [`Cache`]: get/set/exists/delete, single and batched, with panicking
//!   `must_*` variants.
//! - [`LocalCache`]: a bounded in-process LRU with per-entry expiry.
//! - [`RedisCache`]: a Redis backend over [`zcache_redis::RwRedis`] storing
//!   JSON payloads, optionally gzip or zlib wrapped.

pub mod codec;
pub mod error;
pub mod local;
pub mod metrics;
pub mod redis_cache;
pub mod traits;

pub use codec::{Codec, Compression, Serializer};
pub use error::{CacheError, Result};
pub use local::LocalCache;
pub use metrics::MetricsSnapshot;
pub use redis_cache::{RedisCache, RedisCacheOptions};
pub use traits::{Cache, Cacheable};
