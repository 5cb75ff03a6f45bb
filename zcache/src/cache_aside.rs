use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};
use zcache_redis::RateLimiter;
use zcache_store::{Cache, CacheError, Cacheable};

use crate::error::{must, BoxError, Error, Result};
use crate::options::{StoreMode, ZCacheOptions};
use crate::runtime::{TaskSpawner, TokioSpawner};

/// Cache-aside reads over any [`Cache`].
///
/// Each read derives its key with a caller-supplied function, serves hits from
/// the cache and calls a fallback (the source of truth) for misses. Values the
/// fallback produces are written back with the call's TTL, or the default TTL
/// when the call passes `None`. A fallback returning no value is not cached.
///
/// Write-backs after a successful fallback are best-effort: failures are logged
/// and never reach the caller. Fallback errors are always returned.
///
/// No coordination happens between concurrent calls, so two tasks missing the
/// same key may both run the fallback.
pub struct ZCache<C> {
  cache: Arc<C>,
  default_ttl: Duration,
  fallback_when_error: bool,
  limiter: Option<Arc<dyn RateLimiter>>,
  store_mode: StoreMode,
  spawner: Option<Arc<dyn TaskSpawner>>,
}

impl<C: Cache + 'static> ZCache<C> {
  /// Detached stores use the Tokio runtime current at construction; without
  /// one they run inline until a spawner is set.
  pub fn new(cache: Arc<C>, options: ZCacheOptions) -> Self {
    let spawner = match options.store_mode {
      StoreMode::Detached => TokioSpawner::try_current().map(|s| Arc::new(s) as Arc<dyn TaskSpawner>),
      StoreMode::Inline => None,
    };
    Self {
      cache,
      default_ttl: options.default_ttl,
      fallback_when_error: options.fallback_when_error,
      limiter: None,
      store_mode: options.store_mode,
      spawner,
    }
  }

  /// Bounds how often a failing cache may be bypassed in degraded mode.
  pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
    self.limiter = Some(limiter);
    self
  }

  pub fn with_spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }

  pub fn cache(&self) -> &Arc<C> {
    &self.cache
  }

  pub fn default_ttl(&self) -> Duration {
    self.default_ttl
  }

  /// Reads one value, calling `fallback` on a miss.
  ///
  /// A cache failure other than a miss is returned, unless degraded mode is on
  /// and the rate limiter grants a token, in which case the fallback serves the
  /// read. Degraded mode covers backend errors and undecodable payloads; type
  /// and length mismatches are always returned.
  pub async fn get<T, K, F, Fut, E>(&self, key_fn: K, fallback: F, ttl: Option<Duration>) -> Result<Option<T>>
  where
    T: Cacheable,
    K: FnOnce() -> String,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Into<BoxError>,
  {
    let key = key_fn();
    match self.cache.get::<T>(&key).await {
      Ok(value) => {
        debug!(key = %key, "cache hit");
        return Ok(Some(value));
      }
      Err(e) => self.admit_fallback(&key, e)?,
    }

    let Some(value) = fallback().await.map_err(Error::fallback)? else {
      debug!(key = %key, "fallback returned no value");
      return Ok(None);
    };
    self.store_one(key, value.clone(), self.ttl(ttl)).await;
    Ok(Some(value))
  }

  /// Reads a batch, calling `fallback` once with every id the cache missed.
  ///
  /// The fallback is skipped when everything hit. Entries it returns for ids it
  /// was not asked for, or without a value, are dropped. The rest are returned
  /// and written back in one batch.
  pub async fn get_multi<I, T, K, F, Fut, R, V, E>(
    &self,
    ids: &[I],
    key_fn: K,
    fallback: F,
    ttl: Option<Duration>,
  ) -> Result<HashMap<I, T>>
  where
    I: Eq + Hash + Clone,
    T: Cacheable,
    K: Fn(&I) -> String,
    F: FnOnce(Vec<I>) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: IntoIterator<Item = (I, V)>,
    V: Into<Option<T>>,
    E: Into<BoxError>,
  {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }

    let keys: Vec<String> = ids.iter().map(&key_fn).collect();
    let cached = match self.cache.get_multi::<T>(&keys).await {
      Ok(cached) => cached,
      Err(e) => {
        self.admit_fallback("<batch>", e)?;
        HashMap::new()
      }
    };

    let mut found = HashMap::with_capacity(ids.len());
    let mut missed = Vec::new();
    let mut missed_set = HashSet::new();
    for (id, key) in ids.iter().zip(&keys) {
      match cached.get(key) {
        Some(value) => {
          found.insert(id.clone(), value.clone());
        }
        None => {
          if missed_set.insert(id.clone()) {
            missed.push(id.clone());
          }
        }
      }
    }
    debug!(requested = ids.len(), hits = found.len(), misses = missed.len(), "batch cache read");
    if missed.is_empty() {
      return Ok(found);
    }

    let fetched = fallback(missed).await.map_err(Error::fallback)?;
    let mut store_keys = Vec::new();
    let mut store_values = Vec::new();
    for (id, value) in fetched {
      if !missed_set.contains(&id) {
        continue;
      }
      let Some(value) = value.into() else {
        continue;
      };
      store_keys.push(key_fn(&id));
      store_values.push(value.clone());
      found.insert(id, value);
    }

    if !store_keys.is_empty() {
      self.store_many(store_keys, store_values, self.ttl(ttl)).await;
    }
    Ok(found)
  }

  /// Deletes the derived key.
  pub async fn evict<K>(&self, key_fn: K) -> Result<()>
  where
    K: FnOnce() -> String,
  {
    self.cache.delete(&[key_fn()]).await?;
    Ok(())
  }

  pub async fn evict_multi<I, K>(&self, ids: &[I], key_fn: K) -> Result<()>
  where
    K: Fn(&I) -> String,
  {
    if ids.is_empty() {
      return Ok(());
    }
    let keys: Vec<String> = ids.iter().map(key_fn).collect();
    self.cache.delete(&keys).await?;
    Ok(())
  }

  /// Deletes the key, then recomputes and stores the value regardless of what
  /// was cached. Unlike [`get`](Self::get), a failed write is returned.
  pub async fn refresh<T, K, F, Fut, E>(&self, key_fn: K, fallback: F, ttl: Option<Duration>) -> Result<Option<T>>
  where
    T: Cacheable,
    K: FnOnce() -> String,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Into<BoxError>,
  {
    let key = key_fn();
    self.cache.delete(std::slice::from_ref(&key)).await?;

    let Some(value) = fallback().await.map_err(Error::fallback)? else {
      return Ok(None);
    };
    self.cache.set(&key, &value, self.ttl(ttl)).await?;
    debug!(key = %key, "refreshed cache entry");
    Ok(Some(value))
  }

  /// Deletes every derived key, calls `fallback` with all `ids`, and stores and
  /// returns what it produced for those ids.
  pub async fn refresh_multi<I, T, K, F, Fut, R, V, E>(
    &self,
    ids: &[I],
    key_fn: K,
    fallback: F,
    ttl: Option<Duration>,
  ) -> Result<HashMap<I, T>>
  where
    I: Eq + Hash + Clone,
    T: Cacheable,
    K: Fn(&I) -> String,
    F: FnOnce(Vec<I>) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: IntoIterator<Item = (I, V)>,
    V: Into<Option<T>>,
    E: Into<BoxError>,
  {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }
    let keys: Vec<String> = ids.iter().map(&key_fn).collect();
    self.cache.delete(&keys).await?;

    let requested: HashSet<&I> = ids.iter().collect();
    let fetched = fallback(ids.to_vec()).await.map_err(Error::fallback)?;

    let mut refreshed = HashMap::new();
    for (id, value) in fetched {
      if !requested.contains(&id) {
        continue;
      }
      if let Some(value) = value.into() {
        refreshed.insert(id, value);
      }
    }
    if refreshed.is_empty() {
      return Ok(refreshed);
    }

    let (store_keys, store_values): (Vec<String>, Vec<T>) = refreshed
      .iter()
      .map(|(id, value)| (key_fn(id), value.clone()))
      .unzip();
    self.cache.set_multi(&store_keys, &store_values, self.ttl(ttl)).await?;
    Ok(refreshed)
  }

  pub async fn must_get<T, K, F, Fut, E>(&self, key_fn: K, fallback: F, ttl: Option<Duration>) -> Option<T>
  where
    T: Cacheable,
    K: FnOnce() -> String,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Into<BoxError>,
  {
    must(self.get(key_fn, fallback, ttl).await)
  }

  pub async fn must_get_multi<I, T, K, F, Fut, R, V, E>(
    &self,
    ids: &[I],
    key_fn: K,
    fallback: F,
    ttl: Option<Duration>,
  ) -> HashMap<I, T>
  where
    I: Eq + Hash + Clone,
    T: Cacheable,
    K: Fn(&I) -> String,
    F: FnOnce(Vec<I>) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: IntoIterator<Item = (I, V)>,
    V: Into<Option<T>>,
    E: Into<BoxError>,
  {
    must(self.get_multi(ids, key_fn, fallback, ttl).await)
  }

  pub async fn must_evict<K>(&self, key_fn: K)
  where
    K: FnOnce() -> String,
  {
    must(self.evict(key_fn).await)
  }

  pub async fn must_evict_multi<I, K>(&self, ids: &[I], key_fn: K)
  where
    K: Fn(&I) -> String,
  {
    must(self.evict_multi(ids, key_fn).await)
  }

  pub async fn must_refresh<T, K, F, Fut, E>(&self, key_fn: K, fallback: F, ttl: Option<Duration>) -> Option<T>
  where
    T: Cacheable,
    K: FnOnce() -> String,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Into<BoxError>,
  {
    must(self.refresh(key_fn, fallback, ttl).await)
  }

  pub async fn must_refresh_multi<I, T, K, F, Fut, R, V, E>(
    &self,
    ids: &[I],
    key_fn: K,
    fallback: F,
    ttl: Option<Duration>,
  ) -> HashMap<I, T>
  where
    I: Eq + Hash + Clone,
    T: Cacheable,
    K: Fn(&I) -> String,
    F: FnOnce(Vec<I>) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: IntoIterator<Item = (I, V)>,
    V: Into<Option<T>>,
    E: Into<BoxError>,
  {
    must(self.refresh_multi(ids, key_fn, fallback, ttl).await)
  }

  fn ttl(&self, ttl: Option<Duration>) -> Duration {
    ttl.unwrap_or(self.default_ttl)
  }

  /// Decides whether a failed cache read may be served by the fallback.
  fn admit_fallback(&self, key: &str, e: CacheError) -> Result<()> {
    if e.is_not_found() {
      debug!(key, "cache miss");
      return Ok(());
    }
    if degradable(&e) && self.can_fallback_when_error() {
      warn!(key, error = %e, "cache read failed, serving from fallback");
      return Ok(());
    }
    Err(e.into())
  }

  fn can_fallback_when_error(&self) -> bool {
    if !self.fallback_when_error {
      return false;
    }
    match &self.limiter {
      Some(limiter) => limiter.take_available(1) != 0,
      None => true,
    }
  }

  async fn store_one<T: Cacheable>(&self, key: String, value: T, ttl: Duration) {
    match self.detached_spawner() {
      Some(spawner) => {
        let cache = self.cache.clone();
        spawner.spawn(Box::pin(async move {
          if let Err(e) = cache.set(&key, &value, ttl).await {
            error!(key = %key, error = %e, "detached cache store failed");
          }
        }));
      }
      None => {
        if let Err(e) = self.cache.set(&key, &value, ttl).await {
          warn!(key = %key, error = %e, "cache store after fallback failed");
        }
      }
    }
  }

  async fn store_many<T: Cacheable>(&self, keys: Vec<String>, values: Vec<T>, ttl: Duration) {
    match self.detached_spawner() {
      Some(spawner) => {
        let cache = self.cache.clone();
        spawner.spawn(Box::pin(async move {
          if let Err(e) = cache.set_multi(&keys, &values, ttl).await {
            error!(count = keys.len(), error = %e, "detached batch cache store failed");
          }
        }));
      }
      None => {
        if let Err(e) = self.cache.set_multi(&keys, &values, ttl).await {
          warn!(count = keys.len(), error = %e, "batch cache store after fallback failed");
        }
      }
    }
  }

  fn detached_spawner(&self) -> Option<&Arc<dyn TaskSpawner>> {
    match self.store_mode {
      StoreMode::Detached => self.spawner.as_ref(),
      StoreMode::Inline => None,
    }
  }
}

// Backend failures and corrupt payloads; the write-back after the fallback
// overwrites a corrupt entry. Type and length mismatches are caller bugs.
fn degradable(e: &CacheError) -> bool {
  !e.is_fatal() || matches!(e, CacheError::Decode(_))
}

impl<C> fmt::Debug for ZCache<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ZCache")
      .field("default_ttl", &self.default_ttl)
      .field("fallback_when_error", &self.fallback_when_error)
      .field("rate_limited", &self.limiter.is_some())
      .field("store_mode", &self.store_mode)
      .finish_non_exhaustive()
  }
}
