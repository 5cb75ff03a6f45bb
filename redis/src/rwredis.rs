use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use redis::{Cmd, Value};
use tracing::warn;

use crate::command;
use crate::config::{ClientConfig, PoolConfig, RetryConfig};
use crate::conn::{Dialer, TcpDialer};
use crate::error::Result;
use crate::pool::{Pool, PooledConnection};
use crate::ratelimit::{RateLimiter, TokenBucket};

/// A client over one primary and any number of replicas.
///
/// Writes go to the primary pool. Reads rotate over the replica pools in
/// round-robin order; with no replicas configured the primary also serves reads.
pub struct RwRedis {
  name: String,
  write_pool: Pool,
  read_pools: Vec<Pool>,
  cursor: AtomicU64,
  retry_on_timeout: bool,
  retry_limiter: TokenBucket,
}

impl RwRedis {
  /// Builds a client that dials real endpoints over TCP.
  pub fn new(
    name: impl Into<String>,
    write_url: &str,
    read_urls: &[String],
    pool: PoolConfig,
    retry: RetryConfig,
  ) -> Result<Self> {
    let dialer = |url: &str| -> Result<Arc<dyn Dialer>> {
      Ok(Arc::new(TcpDialer::new(
        url,
        pool.connect_timeout,
        pool.read_timeout,
        pool.write_timeout,
      )?))
    };

    let write = dialer(write_url)?;
    let reads = read_urls
      .iter()
      .map(|url| dialer(url))
      .collect::<Result<Vec<_>>>()?;
    Ok(Self::with_dialers(name, write, reads, pool, retry))
  }

  pub fn from_config(config: &ClientConfig) -> Result<Self> {
    Self::new(
      config.name.clone(),
      &config.write_url,
      &config.read_urls,
      config.pool.clone(),
      config.retry.clone(),
    )
  }

  /// Builds a client over caller-supplied dialers.
  pub fn with_dialers(
    name: impl Into<String>,
    write: Arc<dyn Dialer>,
    reads: Vec<Arc<dyn Dialer>>,
    pool: PoolConfig,
    retry: RetryConfig,
  ) -> Self {
    let write_pool = Pool::new(write.clone(), pool.clone());
    let read_pools = if reads.is_empty() {
      vec![Pool::new(write, pool)]
    } else {
      reads
        .into_iter()
        .map(|dialer| Pool::new(dialer, pool.clone()))
        .collect()
    };

    Self {
      name: name.into(),
      write_pool,
      read_pools,
      cursor: AtomicU64::new(rand::random::<u64>()),
      retry_on_timeout: retry.on_timeout,
      retry_limiter: TokenBucket::new(retry.max_per_second, retry.capacity),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn write_pool(&self) -> &Pool {
    &self.write_pool
  }

  pub fn read_pools(&self) -> &[Pool] {
    &self.read_pools
  }

  /// Advances the shared cursor and returns the next replica pool.
  fn next_read_pool(&self) -> &Pool {
    let n = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    &self.read_pools[(n % self.read_pools.len() as u64) as usize]
  }

  /// Borrows a connection to the primary, e.g. for a pipeline of writes.
  pub async fn write_conn(&self) -> Result<PooledConnection> {
    self.write_pool.get().await
  }

  /// Borrows a connection to the next replica, e.g. for a pipeline of reads.
  pub async fn read_conn(&self) -> Result<PooledConnection> {
    self.next_read_pool().get().await
  }

  async fn execute_once(&self, cmd: &Cmd, read: bool) -> Result<Value> {
    let mut conn = if read {
      self.read_conn().await?
    } else {
      self.write_conn().await?
    };
    conn.request(cmd).await
  }

  /// Runs one command on the pool its verb is classified for.
  ///
  /// A network timeout is retried once when retry-on-timeout is enabled and
  /// the client's retry bucket has a token. Reset connections are handled at
  /// the connection level for idempotent verbs.
  pub async fn execute(&self, cmd: &Cmd) -> Result<Value> {
    let verb = command::verb(cmd);
    let read = command::is_read_command(&verb);

    let result = self.execute_once(cmd, read).await;
    match result {
      Err(e) if e.is_timeout() && self.retry_on_timeout && self.retry_limiter.take_available(1) > 0 => {
        warn!(client = %self.name, command = %verb, error = %e, "retry on timeout");
        self.execute_once(cmd, read).await
      }
      other => other,
    }
  }

  /// Like [`execute`](Self::execute) but panics on error.
  pub async fn must_execute(&self, cmd: &Cmd) -> Value {
    match self.execute(cmd).await {
      Ok(value) => value,
      Err(e) => panic!("redis client '{}': {e}", self.name),
    }
  }

  /// Closes the idle connections of every pool.
  pub fn close(&self) {
    self.write_pool.close();
    for pool in &self.read_pools {
      pool.close();
    }
  }
}

impl fmt::Debug for RwRedis {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RwRedis")
      .field("name", &self.name)
      .field("write", &self.write_pool.address())
      .field(
        "read",
        &self.read_pools.iter().map(Pool::address).collect::<Vec<_>>(),
      )
      .field("retry_on_timeout", &self.retry_on_timeout)
      .finish_non_exhaustive()
  }
}
