//! Cache-aside reads over pluggable backends.
//!
//! [`ZCache`] wraps any [`Cache`] (the in-process [`LocalCache`] or the Redis
//! backed [`RedisCache`]) and turns "compute the authoritative value"
//! functions into cached reads, with batched partial fallback, forced refresh,
//! eviction, and an optional rate-limited degraded mode that serves from the
//! fallback while the cache is failing.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use zcache::{LocalCache, ZCache, ZCacheOptions};
//!
//! # async fn load_name(id: u64) -> Result<Option<String>, std::io::Error> { Ok(Some(id.to_string())) }
//! # async fn demo() -> zcache::Result<()> {
//! let cache = ZCache::new(
//!   Arc::new(LocalCache::new(10_000)),
//!   ZCacheOptions::new(Duration::from_secs(300)),
//! );
//!
//! let id = 42u64;
//! let name: Option<String> = cache
//!   .get(|| format!("user:name:{id}"), || load_name(id), None)
//!   .await?;
//! # let _ = name;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod options;
pub mod runtime;
mod cache_aside;

pub use error::{BoxError, Error, Result};
pub use options::{StoreMode, ZCacheOptions};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use cache_aside::ZCache;

pub use zcache_redis::{ClientRegistry, RateLimiter, RwRedis, TokenBucket};
pub use zcache_store::{
  Cache, CacheError, Cacheable, Compression, LocalCache, RedisCache, RedisCacheOptions, Serializer,
};

pub use zcache_redis;
pub use zcache_store;
