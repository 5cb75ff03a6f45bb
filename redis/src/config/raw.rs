use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use super::de::option_duration;

// --- Top Level Config ---
#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigRaw {
  #[serde(default)]
  pub clients: HashMap<String, ClientConfigRaw>,
}

// --- Client Config ---
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfigRaw {
  pub write: String,
  #[serde(default)] // No replicas means reads go to the primary
  pub read: Vec<String>,
  #[serde(default)]
  pub pool: Option<PoolConfigRaw>,
  #[serde(default)]
  pub retry: Option<RetryConfigRaw>,
}

// --- Pool Config ---
#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PoolConfigRaw {
  #[serde(default)]
  pub max_idle: Option<usize>,
  #[serde(default)]
  pub max_active: Option<usize>,
  #[serde(default)]
  pub wait: Option<bool>,
  #[serde(default, deserialize_with = "option_duration")]
  pub wait_timeout: Option<Duration>,
  #[serde(default, deserialize_with = "option_duration")]
  pub max_conn_lifetime: Option<Duration>,
  #[serde(default, deserialize_with = "option_duration")]
  pub idle_timeout: Option<Duration>,
  #[serde(default, deserialize_with = "option_duration")]
  pub connect_timeout: Option<Duration>,
  #[serde(default, deserialize_with = "option_duration")]
  pub read_timeout: Option<Duration>,
  #[serde(default, deserialize_with = "option_duration")]
  pub write_timeout: Option<Duration>,
  #[serde(default, deserialize_with = "option_duration")]
  pub slowlog: Option<Duration>,
}

// --- Retry Config ---
#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RetryConfigRaw {
  #[serde(default)] // Defaults to false if not present
  pub on_timeout: bool,
  #[serde(default)]
  pub max_per_second: Option<f64>,
  #[serde(default)]
  pub capacity: Option<u64>,
}
