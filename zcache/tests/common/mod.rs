#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zcache::{Cache, CacheError, Cacheable, LocalCache};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
  pub id: u64,
  pub title: String,
}

pub fn article(id: u64) -> Article {
  Article {
    id,
    title: format!("article {id}"),
  }
}

pub fn article_key(id: &u64) -> String {
  format!("article:{id}")
}

/// Counts how many times a fallback ran.
#[derive(Default)]
pub struct Calls(AtomicUsize);

impl Calls {
  pub fn hit(&self) {
    self.0.fetch_add(1, Ordering::SeqCst);
  }

  pub fn count(&self) -> usize {
    self.0.load(Ordering::SeqCst)
  }
}

/// A local cache whose reads and writes can be made to fail.
pub struct FlakyCache {
  pub inner: LocalCache,
  fail_reads: AtomicBool,
  fail_writes: AtomicBool,
  corrupt_reads: AtomicBool,
  reads: AtomicUsize,
}

impl FlakyCache {
  pub fn new() -> Self {
    Self {
      inner: LocalCache::new(1024),
      fail_reads: AtomicBool::new(false),
      fail_writes: AtomicBool::new(false),
      corrupt_reads: AtomicBool::new(false),
      reads: AtomicUsize::new(0),
    }
  }

  pub fn fail_reads(&self, fail: bool) {
    self.fail_reads.store(fail, Ordering::SeqCst);
  }

  pub fn fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  /// Reads fail as if the stored payload could not be decoded.
  pub fn corrupt_reads(&self, corrupt: bool) {
    self.corrupt_reads.store(corrupt, Ordering::SeqCst);
  }

  pub fn reads(&self) -> usize {
    self.reads.load(Ordering::SeqCst)
  }

  fn check(&self, flag: &AtomicBool) -> Result<(), CacheError> {
    if flag.load(Ordering::SeqCst) {
      Err(CacheError::Backend(zcache_redis::Error::Io(io::Error::new(
        io::ErrorKind::TimedOut,
        "backend timed out",
      ))))
    } else {
      Ok(())
    }
  }

  fn check_read(&self) -> Result<(), CacheError> {
    self.reads.fetch_add(1, Ordering::SeqCst);
    self.check(&self.fail_reads)?;
    if self.corrupt_reads.load(Ordering::SeqCst) {
      return Err(CacheError::Decode("expected value at line 1 column 1".to_string()));
    }
    Ok(())
  }
}

#[async_trait]
impl Cache for FlakyCache {
  async fn get<T: Cacheable>(&self, key: &str) -> Result<T, CacheError> {
    self.check_read()?;
    self.inner.get(key).await
  }

  async fn get_multi<T: Cacheable>(&self, keys: &[String]) -> Result<HashMap<String, T>, CacheError> {
    self.check_read()?;
    self.inner.get_multi(keys).await
  }

  async fn exists(&self, key: &str) -> Result<bool, CacheError> {
    self.check(&self.fail_reads)?;
    self.inner.exists(key).await
  }

  async fn exists_multi(&self, keys: &[String]) -> Result<Vec<bool>, CacheError> {
    self.check(&self.fail_reads)?;
    self.inner.exists_multi(keys).await
  }

  async fn set<T: Cacheable>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
    self.check(&self.fail_writes)?;
    self.inner.set(key, value, ttl).await
  }

  async fn set_multi<T: Cacheable>(&self, keys: &[String], values: &[T], ttl: Duration) -> Result<(), CacheError> {
    self.check(&self.fail_writes)?;
    self.inner.set_multi(keys, values, ttl).await
  }

  async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
    self.check(&self.fail_writes)?;
    self.inner.delete(keys).await
  }
}
