use std::fmt;

use url::Url;

use crate::error::{Error, Result};

/// A `host:port` pair identifying the primary or one replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
  host: String,
  port: u16,
}

impl Address {
  /// Parses the endpoint out of a connection URL such as `redis://10.0.0.1:6379/0`.
  ///
  /// Both the host and an explicit port are required.
  pub fn parse(raw_url: &str) -> Result<Self> {
    let url = Url::parse(raw_url).map_err(|e| Error::InvalidAddress(format!("{raw_url}: {e}")))?;
    let host = url
      .host_str()
      .filter(|h| !h.is_empty())
      .ok_or_else(|| Error::InvalidAddress(format!("{raw_url}: missing host")))?;
    let port = url
      .port()
      .ok_or_else(|| Error::InvalidAddress(format!("{raw_url}: missing port")))?;

    Ok(Self {
      host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
      port,
    })
  }

  pub fn host(&self) -> &str {
    &self.host
  }

  pub fn port(&self) -> u16 {
    self.port
  }

  /// The name this endpoint is reported under in logs, e.g. `redis_10_0_0_1_6379`.
  pub fn target_unit(&self) -> String {
    format!("redis_{}_{}", self.host, self.port).replace(['.', ':'], "_")
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.host.contains(':') {
      write!(f, "[{}]:{}", self.host, self.port)
    } else {
      write!(f, "{}:{}", self.host, self.port)
    }
  }
}
