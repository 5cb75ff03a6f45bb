use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use redis::{Cmd, Value};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::command;
use crate::config::PoolConfig;
use crate::conn::{Connection, Dialer};
use crate::error::{Error, Result};
use crate::metrics::{PoolMetrics, PoolStats};

/// Idle connections younger than this are reused without a liveness probe.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);

struct IdleConn {
  conn: Box<dyn Connection>,
  created: Instant,
  idle_since: Instant,
}

pub(crate) struct PoolInner {
  dialer: Arc<dyn Dialer>,
  config: PoolConfig,
  // Front is the most recently released connection.
  idle: Mutex<VecDeque<IdleConn>>,
  // `None` when `max_active` is zero (unlimited).
  slots: Option<Arc<Semaphore>>,
  closed: AtomicBool,
  metrics: PoolMetrics,
  addr: String,
  target_unit: String,
}

/// A bounded pool of connections to one endpoint. Cheap to clone; clones
/// share the same connections.
#[derive(Clone)]
pub struct Pool {
  inner: Arc<PoolInner>,
}

impl Pool {
  pub fn new(dialer: Arc<dyn Dialer>, config: PoolConfig) -> Self {
    let addr = dialer.address().to_string();
    let target_unit = dialer.address().target_unit();
    let slots = (config.max_active > 0).then(|| Arc::new(Semaphore::new(config.max_active)));

    Self {
      inner: Arc::new(PoolInner {
        dialer,
        config,
        idle: Mutex::new(VecDeque::new()),
        slots,
        closed: AtomicBool::new(false),
        metrics: PoolMetrics::default(),
        addr,
        target_unit,
      }),
    }
  }

  /// Borrows a connection, reusing an idle one when possible.
  ///
  /// At the `max_active` limit this either fails with `PoolExhausted` or,
  /// when `wait` is configured, waits for a release (bounded by `wait_timeout`
  /// if set). Dropping the returned future abandons the wait.
  ///
  /// The connection goes back to the pool when the guard is dropped.
  pub async fn get(&self) -> Result<PooledConnection> {
    let inner = &self.inner;
    if inner.closed.load(Ordering::Acquire) {
      return Err(inner.closed_error());
    }

    let permit = inner.acquire_slot().await?;
    let (conn, created) = inner.checkout().await?;

    PoolMetrics::incr(&inner.metrics.borrowed);
    PoolMetrics::incr(&inner.metrics.in_use);
    Ok(PooledConnection {
      conn: Some(conn),
      created,
      broken: false,
      pool: inner.clone(),
      _permit: permit,
    })
  }

  /// Closes every idle connection and refuses further borrows. Connections
  /// currently lent out are closed when they are released.
  pub fn close(&self) {
    let inner = &self.inner;
    inner.closed.store(true, Ordering::Release);
    if let Some(slots) = &inner.slots {
      slots.close();
    }
    let drained = {
      let mut idle = inner.idle.lock();
      idle.drain(..).count()
    };
    debug!(target_unit = %inner.target_unit, drained, "connection pool closed");
  }

  pub fn is_closed(&self) -> bool {
    self.inner.closed.load(Ordering::Acquire)
  }

  pub fn stats(&self) -> PoolStats {
    let idle = self.inner.idle.lock().len();
    self.inner.metrics.snapshot(idle)
  }

  /// The `host:port` this pool connects to.
  pub fn address(&self) -> &str {
    &self.inner.addr
  }

  pub fn config(&self) -> &PoolConfig {
    &self.inner.config
  }
}

impl fmt::Debug for Pool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pool")
      .field("addr", &self.inner.addr)
      .field("stats", &self.stats())
      .finish()
  }
}

impl PoolInner {
  fn closed_error(&self) -> Error {
    Error::PoolClosed {
      addr: self.addr.clone(),
    }
  }

  fn exhausted_error(&self) -> Error {
    PoolMetrics::incr(&self.metrics.exhausted);
    Error::PoolExhausted {
      addr: self.addr.clone(),
    }
  }

  async fn acquire_slot(&self) -> Result<Option<OwnedSemaphorePermit>> {
    let Some(slots) = &self.slots else {
      return Ok(None);
    };

    if !self.config.wait {
      return match slots.clone().try_acquire_owned() {
        Ok(permit) => Ok(Some(permit)),
        Err(tokio::sync::TryAcquireError::Closed) => Err(self.closed_error()),
        Err(tokio::sync::TryAcquireError::NoPermits) => Err(self.exhausted_error()),
      };
    }

    let acquire = slots.clone().acquire_owned();
    let acquired = match self.config.wait_timeout {
      Some(limit) => tokio::time::timeout(limit, acquire)
        .await
        .map_err(|_| self.exhausted_error())?,
      None => acquire.await,
    };
    acquired.map(Some).map_err(|_| self.closed_error())
  }

  /// Takes a usable idle connection or dials a new one. Does not touch slots.
  async fn checkout(&self) -> Result<(Box<dyn Connection>, Instant)> {
    loop {
      let candidate = {
        let mut idle = self.idle.lock();
        self.prune_stale(&mut idle);
        idle.pop_front()
      };
      let Some(mut candidate) = candidate else {
        break;
      };

      if candidate.idle_since.elapsed() >= HEALTH_CHECK_INTERVAL {
        PoolMetrics::incr(&self.metrics.probes);
        if let Err(e) = candidate.conn.request(&redis::cmd("PING")).await {
          PoolMetrics::incr(&self.metrics.probe_failures);
          PoolMetrics::incr(&self.metrics.discarded);
          warn!(target_unit = %self.target_unit, error = %e, "idle connection failed liveness probe");
          continue;
        }
      }
      return Ok((candidate.conn, candidate.created));
    }

    self.dial().await.map(|conn| (conn, Instant::now()))
  }

  async fn dial(&self) -> Result<Box<dyn Connection>> {
    let dialed = if self.config.connect_timeout.is_zero() {
      self.dialer.dial().await
    } else {
      match tokio::time::timeout(self.config.connect_timeout, self.dialer.dial()).await {
        Ok(dialed) => dialed,
        Err(_) => Err(Error::Io(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))),
      }
    };

    match dialed {
      Ok(conn) => {
        PoolMetrics::incr(&self.metrics.dials);
        debug!(target_unit = %self.target_unit, addr = %self.addr, "dialed new connection");
        Ok(conn)
      }
      Err(e) => {
        PoolMetrics::incr(&self.metrics.dial_failures);
        Err(e)
      }
    }
  }

  fn is_expired(&self, created: Instant) -> bool {
    let lifetime = self.config.max_conn_lifetime;
    !lifetime.is_zero() && created.elapsed() >= lifetime
  }

  fn prune_stale(&self, idle: &mut VecDeque<IdleConn>) {
    let idle_timeout = self.config.idle_timeout;
    let before = idle.len();
    idle.retain(|c| {
      let too_idle = !idle_timeout.is_zero() && c.idle_since.elapsed() >= idle_timeout;
      !too_idle && !self.is_expired(c.created)
    });
    for _ in idle.len()..before {
      PoolMetrics::incr(&self.metrics.discarded);
    }
  }

  fn release(&self, conn: Box<dyn Connection>, created: Instant) {
    if self.closed.load(Ordering::Acquire) || self.is_expired(created) {
      PoolMetrics::incr(&self.metrics.discarded);
      return;
    }

    let mut idle = self.idle.lock();
    if idle.len() >= self.config.max_idle {
      drop(idle);
      PoolMetrics::incr(&self.metrics.discarded);
      return;
    }
    idle.push_front(IdleConn {
      conn,
      created,
      idle_since: Instant::now(),
    });
  }

  fn record_latency(&self, command: &str, elapsed: Duration) {
    let threshold = self.config.slowlog;
    if !threshold.is_zero() && elapsed >= threshold {
      PoolMetrics::incr(&self.metrics.slow_commands);
      warn!(
        target_unit = %self.target_unit,
        addr = %self.addr,
        command,
        elapsed_ms = elapsed.as_millis() as u64,
        "slow redis command"
      );
    }
  }
}

/// A connection on loan from a [`Pool`]. Released back to the pool on drop,
/// or closed if it saw an I/O error or was dropped mid-request.
pub struct PooledConnection {
  conn: Option<Box<dyn Connection>>,
  created: Instant,
  broken: bool,
  pool: Arc<PoolInner>,
  // Held for the lifetime of the loan; frees an active slot on drop.
  _permit: Option<OwnedSemaphorePermit>,
}

impl PooledConnection {
  /// Sends one command and reads its reply.
  ///
  /// If the connection was reset or hit end-of-stream and the command is
  /// idempotent, the dead connection is replaced and the command is sent once
  /// more. Other failures are returned as-is.
  pub async fn request(&mut self, cmd: &Cmd) -> Result<Value> {
    let verb = command::verb(cmd);
    let started = Instant::now();

    let mut result = self.send(cmd).await;
    if let Err(e) = &result {
      if e.is_connection_dropped() && command::is_idempotent_command(&verb) {
        warn!(
          target_unit = %self.pool.target_unit,
          command = %verb,
          error = %e,
          "retry on connection reset or eof"
        );
        self.reconnect().await?;
        result = self.send(cmd).await;
      }
    }

    self.pool.record_latency(&verb, started.elapsed());
    result
  }

  /// Writes every command, then reads exactly one reply per command in order.
  /// Never retried.
  pub async fn pipeline(&mut self, cmds: &[Cmd]) -> Result<Vec<Value>> {
    if cmds.is_empty() {
      return Ok(Vec::new());
    }
    let started = Instant::now();

    let conn = self.conn.as_mut().ok_or_else(discarded_error)?;
    self.broken = true;
    let result = conn.pipeline(cmds).await;
    self.broken = matches!(&result, Err(e) if e.is_io());

    self
      .pool
      .record_latency(&format!("PIPELINE[{}]", cmds.len()), started.elapsed());

    let replies = result?;
    if replies.len() != cmds.len() {
      self.broken = true;
      return Err(Error::UnexpectedReply(format!(
        "pipeline of {} commands returned {} replies",
        cmds.len(),
        replies.len()
      )));
    }
    Ok(replies)
  }

  /// Closes the connection instead of returning it to the pool.
  pub fn discard(mut self) {
    self.broken = true;
  }

  async fn send(&mut self, cmd: &Cmd) -> Result<Value> {
    let conn = self.conn.as_mut().ok_or_else(discarded_error)?;
    // Stays set if this future is dropped before the reply arrives.
    self.broken = true;
    let result = conn.request(cmd).await;
    self.broken = matches!(&result, Err(e) if e.is_io());
    result
  }

  async fn reconnect(&mut self) -> Result<()> {
    if self.conn.take().is_some() {
      PoolMetrics::incr(&self.pool.metrics.discarded);
    }
    let (conn, created) = self.pool.checkout().await?;
    self.conn = Some(conn);
    self.created = created;
    self.broken = false;
    Ok(())
  }
}

fn discarded_error() -> Error {
  Error::Io(io::Error::new(
    io::ErrorKind::NotConnected,
    "connection was discarded after a failed reconnect",
  ))
}

impl Drop for PooledConnection {
  fn drop(&mut self) {
    self.pool.metrics.in_use.fetch_sub(1, Ordering::Relaxed);
    if let Some(conn) = self.conn.take() {
      if self.broken {
        PoolMetrics::incr(&self.pool.metrics.discarded);
      } else {
        self.pool.release(conn, self.created);
      }
    }
  }
}

impl fmt::Debug for PooledConnection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PooledConnection")
      .field("addr", &self.pool.addr)
      .field("broken", &self.broken)
      .finish_non_exhaustive()
  }
}
