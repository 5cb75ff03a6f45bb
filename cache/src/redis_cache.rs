//! The distributed backend.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use zcache_redis::{cmd, from_redis_value, Cmd, FromRedisValue, RwRedis, Value};

use crate::codec::{Codec, Compression, Serializer};
use crate::error::{CacheError, Result};
use crate::traits::{Cache, Cacheable};

/// Options for a [`RedisCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct RedisCacheOptions {
  pub compression: Compression,
  /// Escape `<`, `>` and `&` in JSON strings.
  pub escape_html: bool,
  pub serializer: Serializer,
  /// TTL applied when a write passes a zero TTL.
  pub default_ttl: Duration,
}

impl Default for RedisCacheOptions {
  fn default() -> Self {
    Self {
      compression: Compression::None,
      escape_html: true,
      serializer: Serializer::Json,
      default_ttl: Duration::from_secs(60),
    }
  }
}

impl RedisCacheOptions {
  pub fn compression(mut self, compression: Compression) -> Self {
    self.compression = compression;
    self
  }

  pub fn escape_html(mut self, escape_html: bool) -> Self {
    self.escape_html = escape_html;
    self
  }

  pub fn serializer(mut self, serializer: Serializer) -> Self {
    self.serializer = serializer;
    self
  }

  pub fn default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }
}

/// A [`Cache`] over a read/write split Redis client.
///
/// Reads (`GET`, `MGET`, `EXISTS`) go to a replica and writes (`SETEX`, `DEL`)
/// to the primary. Batched existence checks and writes are pipelined on a
/// single borrowed connection.
///
/// TTLs are sent in whole seconds, rounded down, with a minimum of one second.
pub struct RedisCache {
  client: Arc<RwRedis>,
  codec: Codec,
  default_ttl: Duration,
}

impl RedisCache {
  pub fn new(client: Arc<RwRedis>, options: RedisCacheOptions) -> Self {
    Self {
      client,
      codec: Codec::new(options.compression, options.serializer, options.escape_html),
      default_ttl: options.default_ttl,
    }
  }

  pub fn client(&self) -> &Arc<RwRedis> {
    &self.client
  }

  pub fn codec(&self) -> &Codec {
    &self.codec
  }

  fn ttl_secs(&self, ttl: Duration) -> u64 {
    let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
    ttl.as_secs().max(1)
  }

  fn setex(&self, key: &str, secs: u64, payload: &[u8]) -> Cmd {
    let mut setex = cmd("SETEX");
    setex.arg(key).arg(secs).arg(payload);
    setex
  }
}

fn reply<T: FromRedisValue>(value: &Value) -> Result<T> {
  from_redis_value(value).map_err(|e| CacheError::Backend(e.into()))
}

#[async_trait]
impl Cache for RedisCache {
  async fn get<T: Cacheable>(&self, key: &str) -> Result<T> {
    let mut get = cmd("GET");
    get.arg(key);
    let value = self.client.execute(&get).await?;
    match reply::<Option<Vec<u8>>>(&value)? {
      Some(payload) => self.codec.decode(&payload),
      None => Err(CacheError::NotFound),
    }
  }

  async fn get_multi<T: Cacheable>(&self, keys: &[String]) -> Result<HashMap<String, T>> {
    if keys.is_empty() {
      return Ok(HashMap::new());
    }
    let mut mget = cmd("MGET");
    mget.arg(keys);
    let value = self.client.execute(&mget).await?;
    let payloads = reply::<Vec<Option<Vec<u8>>>>(&value)?;

    let mut found = HashMap::with_capacity(keys.len());
    for (key, payload) in keys.iter().zip(payloads) {
      if let Some(payload) = payload {
        found.insert(key.clone(), self.codec.decode(&payload)?);
      }
    }
    debug!(requested = keys.len(), found = found.len(), "redis cache batch read");
    Ok(found)
  }

  async fn exists(&self, key: &str) -> Result<bool> {
    let mut exists = cmd("EXISTS");
    exists.arg(key);
    let value = self.client.execute(&exists).await?;
    reply(&value)
  }

  async fn exists_multi(&self, keys: &[String]) -> Result<Vec<bool>> {
    if keys.is_empty() {
      return Ok(Vec::new());
    }
    let cmds: Vec<Cmd> = keys
      .iter()
      .map(|key| {
        let mut exists = cmd("EXISTS");
        exists.arg(key);
        exists
      })
      .collect();

    let mut conn = self.client.read_conn().await?;
    let replies = conn.pipeline(&cmds).await?;
    replies.iter().map(reply::<bool>).collect()
  }

  async fn set<T: Cacheable>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
    let payload = self.codec.encode(value)?;
    self
      .client
      .execute(&self.setex(key, self.ttl_secs(ttl), &payload))
      .await?;
    Ok(())
  }

  async fn set_multi<T: Cacheable>(&self, keys: &[String], values: &[T], ttl: Duration) -> Result<()> {
    if keys.len() != values.len() {
      return Err(CacheError::LengthMismatch {
        keys: keys.len(),
        values: values.len(),
      });
    }
    if keys.is_empty() {
      return Ok(());
    }

    let secs = self.ttl_secs(ttl);
    let cmds = keys
      .iter()
      .zip(values)
      .map(|(key, value)| -> Result<Cmd> {
        let payload = self.codec.encode(value)?;
        Ok(self.setex(key, secs, &payload))
      })
      .collect::<Result<Vec<_>>>()?;

    let mut conn = self.client.write_conn().await?;
    conn.pipeline(&cmds).await?;
    Ok(())
  }

  async fn delete(&self, keys: &[String]) -> Result<()> {
    if keys.is_empty() {
      return Ok(());
    }
    let mut del = cmd("DEL");
    del.arg(keys);
    self.client.execute(&del).await?;
    Ok(())
  }
}

impl fmt::Debug for RedisCache {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RedisCache")
      .field("client", &self.client.name())
      .field("codec", &self.codec)
      .field("default_ttl", &self.default_ttl)
      .finish()
  }
}
