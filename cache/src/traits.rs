use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{must, Result};

/// Values that can live in any [`Cache`] backend.
///
/// Blanket-implemented for every type that is serializable, cloneable and
/// shareable across tasks.
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// The storage contract shared by every backend.
///
/// A zero `ttl` means "use the backend's default". Reading a value with a
/// different type than it was stored with fails with
/// [`CacheError::TypeMismatch`](crate::CacheError::TypeMismatch) (or
/// [`Decode`](crate::CacheError::Decode) when the payload cannot be parsed at
/// all), never with a garbage value.
///
/// Each `must_*` method panics with the error's display text where the plain
/// method would return an error.
#[async_trait]
pub trait Cache: Send + Sync {
  /// Fails with `NotFound` if the key is absent or expired.
  async fn get<T: Cacheable>(&self, key: &str) -> Result<T>;

  /// Returns the hits only; absent keys are simply missing from the map.
  async fn get_multi<T: Cacheable>(&self, keys: &[String]) -> Result<HashMap<String, T>>;

  async fn exists(&self, key: &str) -> Result<bool>;

  /// One flag per key, in input order.
  async fn exists_multi(&self, keys: &[String]) -> Result<Vec<bool>>;

  async fn set<T: Cacheable>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

  /// Fails with `LengthMismatch` unless there is exactly one value per key.
  async fn set_multi<T: Cacheable>(&self, keys: &[String], values: &[T], ttl: Duration) -> Result<()>;

  /// Deleting an absent key is not an error.
  async fn delete(&self, keys: &[String]) -> Result<()>;

  async fn must_get<T: Cacheable>(&self, key: &str) -> T {
    must(self.get(key).await)
  }

  async fn must_get_multi<T: Cacheable>(&self, keys: &[String]) -> HashMap<String, T> {
    must(self.get_multi(keys).await)
  }

  async fn must_exists(&self, key: &str) -> bool {
    must(self.exists(key).await)
  }

  async fn must_exists_multi(&self, keys: &[String]) -> Vec<bool> {
    must(self.exists_multi(keys).await)
  }

  async fn must_set<T: Cacheable>(&self, key: &str, value: &T, ttl: Duration) {
    must(self.set(key, value, ttl).await)
  }

  async fn must_set_multi<T: Cacheable>(&self, keys: &[String], values: &[T], ttl: Duration) {
    must(self.set_multi(keys, values, ttl).await)
  }

  async fn must_delete(&self, keys: &[String]) {
    must(self.delete(keys).await)
  }
}
