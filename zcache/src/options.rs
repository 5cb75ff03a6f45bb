use std::time::Duration;

/// How a value fetched by a fallback is written back to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreMode {
  /// The write completes before the read returns.
  #[default]
  Inline,
  /// The write runs as a detached task; the read returns immediately.
  Detached,
}

/// Options for a [`ZCache`](crate::ZCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZCacheOptions {
  /// TTL used when a call does not pass one.
  pub default_ttl: Duration,
  /// Serve from the fallback when the cache read fails for a reason other
  /// than a miss. Bounded by the rate limiter, if one is set.
  pub fallback_when_error: bool,
  pub store_mode: StoreMode,
}

impl Default for ZCacheOptions {
  fn default() -> Self {
    Self {
      default_ttl: Duration::from_secs(60),
      fallback_when_error: false,
      store_mode: StoreMode::Inline,
    }
  }
}

impl ZCacheOptions {
  pub fn new(default_ttl: Duration) -> Self {
    Self {
      default_ttl,
      ..Self::default()
    }
  }

  pub fn default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }

  pub fn fallback_when_error(mut self, enabled: bool) -> Self {
    self.fallback_when_error = enabled;
    self
  }

  pub fn store_mode(mut self, mode: StoreMode) -> Self {
    self.store_mode = mode;
    self
  }
}
