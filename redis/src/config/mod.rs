// This module holds the typed client options and the YAML file layer that produces them.

pub mod de;
pub mod raw;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::address::Address;
use crate::error::{Error, Result};
use raw::{ClientConfigRaw, ConfigRaw, PoolConfigRaw, RetryConfigRaw};

/// Settings for one per-endpoint connection pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
  /// Maximum number of idle connections kept for reuse.
  pub max_idle: usize,
  /// Maximum number of connections handed out at once. Zero means unlimited.
  pub max_active: usize,
  /// Whether a borrow at the `max_active` limit waits for a release.
  pub wait: bool,
  /// Upper bound on that wait. `None` waits until released or cancelled.
  pub wait_timeout: Option<Duration>,
  /// Connections older than this are closed instead of reused. Zero disables.
  pub max_conn_lifetime: Duration,
  /// Connections idle longer than this are closed instead of reused. Zero disables.
  pub idle_timeout: Duration,
  pub connect_timeout: Duration,
  pub read_timeout: Duration,
  pub write_timeout: Duration,
  /// Commands slower than this are logged at warn level.
  pub slowlog: Duration,
}

impl Default for PoolConfig {
  fn default() -> Self {
    Self {
      max_idle: 128,
      max_active: 128,
      wait: false,
      wait_timeout: None,
      max_conn_lifetime: Duration::from_secs(5 * 60),
      idle_timeout: Duration::from_secs(10 * 60),
      connect_timeout: Duration::from_millis(100),
      read_timeout: Duration::from_millis(200),
      write_timeout: Duration::from_millis(200),
      slowlog: Duration::from_millis(100),
    }
  }
}

impl PoolConfig {
  pub fn max_idle(mut self, max_idle: usize) -> Self {
    self.max_idle = max_idle;
    self
  }

  pub fn max_active(mut self, max_active: usize) -> Self {
    self.max_active = max_active;
    self
  }

  pub fn wait(mut self, wait: bool) -> Self {
    self.wait = wait;
    self
  }

  pub fn wait_timeout(mut self, timeout: Duration) -> Self {
    self.wait_timeout = Some(timeout);
    self
  }

  pub fn max_conn_lifetime(mut self, lifetime: Duration) -> Self {
    self.max_conn_lifetime = lifetime;
    self
  }

  pub fn idle_timeout(mut self, timeout: Duration) -> Self {
    self.idle_timeout = timeout;
    self
  }

  pub fn connect_timeout(mut self, timeout: Duration) -> Self {
    self.connect_timeout = timeout;
    self
  }

  pub fn read_timeout(mut self, timeout: Duration) -> Self {
    self.read_timeout = timeout;
    self
  }

  pub fn write_timeout(mut self, timeout: Duration) -> Self {
    self.write_timeout = timeout;
    self
  }

  pub fn slowlog(mut self, threshold: Duration) -> Self {
    self.slowlog = threshold;
    self
  }
}

/// Retry-on-timeout policy shared by every pool of one [`RwRedis`](crate::RwRedis).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
  /// Retry a timed-out command once. Only enable this when every command the
  /// client issues is idempotent: a retried write may be applied twice.
  pub on_timeout: bool,
  /// Bucket refill rate, in retries per second.
  pub max_per_second: f64,
  /// Bucket capacity.
  pub capacity: u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      on_timeout: false,
      max_per_second: 5.0,
      capacity: 10,
    }
  }
}

impl RetryConfig {
  pub fn on_timeout(mut self, enabled: bool) -> Self {
    self.on_timeout = enabled;
    self
  }

  pub fn max_per_second(mut self, rate: f64) -> Self {
    self.max_per_second = rate;
    self
  }

  pub fn capacity(mut self, capacity: u64) -> Self {
    self.capacity = capacity;
    self
  }
}

/// Everything needed to build one named [`RwRedis`](crate::RwRedis).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
  pub name: String,
  pub write_url: String,
  pub read_urls: Vec<String>,
  pub pool: PoolConfig,
  pub retry: RetryConfig,
}

/// The validated contents of a configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub clients: BTreeMap<String, ClientConfig>,
}

impl Config {
  /// Reads and validates a YAML configuration file.
  pub fn from_file(path: &Path) -> Result<Self> {
    let text = fs::read_to_string(path).map_err(Error::ConfigRead)?;
    Self::from_yaml(&text)
  }

  /// Parses and validates YAML configuration text.
  pub fn from_yaml(text: &str) -> Result<Self> {
    let raw: ConfigRaw = serde_yaml::from_str(text).map_err(|e| Error::ConfigParse(e.to_string()))?;
    process_raw_config(raw)
  }
}

/// Validates the raw, deserialized configuration into typed options.
pub fn process_raw_config(raw_config: ConfigRaw) -> Result<Config> {
  let mut clients = BTreeMap::new();
  for (name, raw_client) in raw_config.clients {
    let client = process_client(&name, raw_client)?;
    clients.insert(name, client);
  }
  Ok(Config { clients })
}

fn process_client(name: &str, raw: ClientConfigRaw) -> Result<ClientConfig> {
  let field = |suffix: &str| format!("clients.{name}.{suffix}");

  if raw.write.trim().is_empty() {
    return Err(Error::InvalidConfigValue {
      field: field("write"),
      message: "write URL cannot be empty".to_string(),
    });
  }
  check_address(&raw.write, field("write"))?;
  for (i, url) in raw.read.iter().enumerate() {
    check_address(url, field(&format!("read[{i}]")))?;
  }

  Ok(ClientConfig {
    name: name.to_string(),
    write_url: raw.write,
    read_urls: raw.read,
    pool: process_pool(raw.pool.unwrap_or_default()),
    retry: process_retry(raw.retry.unwrap_or_default(), &field("retry"))?,
  })
}

fn check_address(url: &str, field: String) -> Result<()> {
  Address::parse(url).map(|_| ()).map_err(|e| Error::InvalidConfigValue {
    field,
    message: e.to_string(),
  })
}

fn process_pool(raw: PoolConfigRaw) -> PoolConfig {
  let defaults = PoolConfig::default();
  PoolConfig {
    max_idle: raw.max_idle.unwrap_or(defaults.max_idle),
    max_active: raw.max_active.unwrap_or(defaults.max_active),
    wait: raw.wait.unwrap_or(defaults.wait),
    wait_timeout: raw.wait_timeout.or(defaults.wait_timeout),
    max_conn_lifetime: raw.max_conn_lifetime.unwrap_or(defaults.max_conn_lifetime),
    idle_timeout: raw.idle_timeout.unwrap_or(defaults.idle_timeout),
    connect_timeout: raw.connect_timeout.unwrap_or(defaults.connect_timeout),
    read_timeout: raw.read_timeout.unwrap_or(defaults.read_timeout),
    write_timeout: raw.write_timeout.unwrap_or(defaults.write_timeout),
    slowlog: raw.slowlog.unwrap_or(defaults.slowlog),
  }
}

fn process_retry(raw: RetryConfigRaw, field: &str) -> Result<RetryConfig> {
  let defaults = RetryConfig::default();
  let retry = RetryConfig {
    on_timeout: raw.on_timeout,
    max_per_second: raw.max_per_second.unwrap_or(defaults.max_per_second),
    capacity: raw.capacity.unwrap_or(defaults.capacity),
  };
  if retry.on_timeout && retry.capacity == 0 {
    return Err(Error::InvalidConfigValue {
      field: format!("{field}.capacity"),
      message: "retry bucket capacity must be at least 1 when on_timeout is set".to_string(),
    });
  }
  if !retry.max_per_second.is_finite() || retry.max_per_second < 0.0 {
    return Err(Error::InvalidConfigValue {
      field: format!("{field}.max_per_second"),
      message: "must be a non-negative number".to_string(),
    });
  }
  Ok(retry)
}
