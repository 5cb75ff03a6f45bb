//! The in-process backend.

mod lru_list;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::traits::{Cache, Cacheable};

use lru_list::LruList;

struct Entry {
  value: Box<dyn Any + Send + Sync>,
  type_name: &'static str,
  expires_at: Option<Instant>,
}

impl Entry {
  fn is_expired(&self, now: Instant) -> bool {
    self.expires_at.is_some_and(|at| at <= now)
  }
}

/// A bounded, least-recently-used cache held in process memory.
///
/// Values are stored as-is (no serialization) together with their type, so
/// reading a key back as a different type is a `TypeMismatch`. Both reads and
/// writes refresh an entry's recency; `exists` does not.
///
/// A zero TTL uses the cache's default TTL. Without a default, such entries
/// never expire. Expired entries are dropped lazily, when next looked up.
pub struct LocalCache {
  entries: Mutex<LruList<String, Entry>>,
  capacity: usize,
  default_ttl: Option<Duration>,
  metrics: Metrics,
}

impl LocalCache {
  /// Creates a cache holding at most `capacity` entries. A capacity of zero is
  /// treated as one.
  pub fn new(capacity: usize) -> Self {
    Self {
      entries: Mutex::new(LruList::new()),
      capacity: capacity.max(1),
      default_ttl: None,
      metrics: Metrics::default(),
    }
  }

  /// Sets the TTL used when a write passes a zero TTL.
  pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = (!ttl.is_zero()).then_some(ttl);
    self
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn default_ttl(&self) -> Option<Duration> {
    self.default_ttl
  }

  /// The number of entries held, including expired ones not yet dropped.
  pub fn len(&self) -> usize {
    self.entries.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    let size = self.len();
    self.metrics.snapshot(size, self.capacity)
  }

  /// Drops every entry without counting them as invalidations.
  pub fn clear(&self) {
    self.entries.lock().clear();
  }

  fn expiry(&self, ttl: Duration, now: Instant) -> Option<Instant> {
    let ttl = if ttl.is_zero() { self.default_ttl } else { Some(ttl) };
    ttl.map(|ttl| now + ttl)
  }

  fn read<T: Cacheable>(
    &self,
    entries: &mut LruList<String, Entry>,
    key: &str,
    now: Instant,
  ) -> Result<T> {
    let expired = match entries.peek(key) {
      Some(entry) => entry.is_expired(now),
      None => {
        Metrics::incr(&self.metrics.misses);
        return Err(CacheError::NotFound);
      }
    };
    if expired {
      entries.remove(key);
      Metrics::incr(&self.metrics.evicted_by_ttl);
      Metrics::incr(&self.metrics.misses);
      debug!(key, "dropped expired local cache entry");
      return Err(CacheError::NotFound);
    }

    let entry = entries.touch(key).ok_or(CacheError::NotFound)?;
    Metrics::incr(&self.metrics.hits);
    entry
      .value
      .downcast_ref::<T>()
      .cloned()
      .ok_or_else(|| CacheError::type_mismatch::<T>(entry.type_name))
  }

  fn write<T: Cacheable>(
    &self,
    entries: &mut LruList<String, Entry>,
    key: &str,
    value: &T,
    expires_at: Option<Instant>,
    now: Instant,
  ) {
    let entry = Entry {
      value: Box::new(value.clone()),
      type_name: std::any::type_name::<T>(),
      expires_at,
    };

    match entries.push_front(key.to_string(), entry) {
      Some(old) if !old.is_expired(now) => Metrics::incr(&self.metrics.updates),
      Some(_) => {
        Metrics::incr(&self.metrics.evicted_by_ttl);
        Metrics::incr(&self.metrics.inserts);
      }
      None => Metrics::incr(&self.metrics.inserts),
    }

    while entries.len() > self.capacity {
      let Some((evicted, _)) = entries.pop_back() else {
        break;
      };
      Metrics::incr(&self.metrics.evicted_by_capacity);
      debug!(key = %evicted, capacity = self.capacity, "evicted least recently used entry");
    }
  }
}

#[async_trait]
impl Cache for LocalCache {
  async fn get<T: Cacheable>(&self, key: &str) -> Result<T> {
    let mut entries = self.entries.lock();
    self.read(&mut entries, key, Instant::now())
  }

  async fn get_multi<T: Cacheable>(&self, keys: &[String]) -> Result<HashMap<String, T>> {
    let now = Instant::now();
    let mut entries = self.entries.lock();
    let mut found = HashMap::with_capacity(keys.len());
    for key in keys {
      match self.read::<T>(&mut entries, key, now) {
        Ok(value) => {
          found.insert(key.clone(), value);
        }
        Err(CacheError::NotFound) => {}
        Err(e) => return Err(e),
      }
    }
    Ok(found)
  }

  async fn exists(&self, key: &str) -> Result<bool> {
    let now = Instant::now();
    let entries = self.entries.lock();
    Ok(entries.peek(key).is_some_and(|entry| !entry.is_expired(now)))
  }

  async fn exists_multi(&self, keys: &[String]) -> Result<Vec<bool>> {
    let now = Instant::now();
    let entries = self.entries.lock();
    Ok(
      keys
        .iter()
        .map(|key| entries.peek(key.as_str()).is_some_and(|entry| !entry.is_expired(now)))
        .collect(),
    )
  }

  async fn set<T: Cacheable>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
    let now = Instant::now();
    let expires_at = self.expiry(ttl, now);
    let mut entries = self.entries.lock();
    self.write(&mut entries, key, value, expires_at, now);
    Ok(())
  }

  async fn set_multi<T: Cacheable>(&self, keys: &[String], values: &[T], ttl: Duration) -> Result<()> {
    if keys.len() != values.len() {
      return Err(CacheError::LengthMismatch {
        keys: keys.len(),
        values: values.len(),
      });
    }
    let now = Instant::now();
    let expires_at = self.expiry(ttl, now);
    let mut entries = self.entries.lock();
    for (key, value) in keys.iter().zip(values) {
      self.write(&mut entries, key, value, expires_at, now);
    }
    Ok(())
  }

  async fn delete(&self, keys: &[String]) -> Result<()> {
    let mut entries = self.entries.lock();
    for key in keys {
      if entries.remove(key.as_str()).is_some() {
        Metrics::incr(&self.metrics.invalidations);
      }
    }
    Ok(())
  }
}

impl fmt::Debug for LocalCache {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LocalCache")
      .field("capacity", &self.capacity)
      .field("default_ttl", &self.default_ttl)
      .field("len", &self.len())
      .finish()
  }
}
