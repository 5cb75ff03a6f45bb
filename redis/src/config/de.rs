// Custom deserialization helpers for the raw configuration structs.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Deserializes an optional humantime duration such as `250ms`, `1s` or `5m`.
pub fn option_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
  D: Deserializer<'de>,
{
  let text: Option<String> = Option::deserialize(deserializer)?;
  text
    .map(|s| humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom))
    .transpose()
}
