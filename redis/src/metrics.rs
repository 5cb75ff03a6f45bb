use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use tokio::time::Instant;

/// A thread-safe, internal metrics collector for one connection pool.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub(crate) struct PoolMetrics {
  // --- Borrowing ---
  pub(crate) borrowed: CachePadded<AtomicU64>,
  pub(crate) in_use: CachePadded<AtomicU64>,
  pub(crate) exhausted: CachePadded<AtomicU64>,

  // --- Connection churn ---
  pub(crate) dials: CachePadded<AtomicU64>,
  pub(crate) dial_failures: CachePadded<AtomicU64>,
  pub(crate) discarded: CachePadded<AtomicU64>,

  // --- Health checks ---
  pub(crate) probes: CachePadded<AtomicU64>,
  pub(crate) probe_failures: CachePadded<AtomicU64>,

  pub(crate) slow_commands: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for PoolMetrics {
  fn default() -> Self {
    Self {
      borrowed: CachePadded::new(AtomicU64::new(0)),
      in_use: CachePadded::new(AtomicU64::new(0)),
      exhausted: CachePadded::new(AtomicU64::new(0)),
      dials: CachePadded::new(AtomicU64::new(0)),
      dial_failures: CachePadded::new(AtomicU64::new(0)),
      discarded: CachePadded::new(AtomicU64::new(0)),
      probes: CachePadded::new(AtomicU64::new(0)),
      probe_failures: CachePadded::new(AtomicU64::new(0)),
      slow_commands: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl PoolMetrics {
  #[inline]
  pub(crate) fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn snapshot(&self, idle: usize) -> PoolStats {
    PoolStats {
      idle,
      in_use: self.in_use.load(Ordering::Relaxed),
      borrowed: self.borrowed.load(Ordering::Relaxed),
      exhausted: self.exhausted.load(Ordering::Relaxed),
      dials: self.dials.load(Ordering::Relaxed),
      dial_failures: self.dial_failures.load(Ordering::Relaxed),
      discarded: self.discarded.load(Ordering::Relaxed),
      probes: self.probes.load(Ordering::Relaxed),
      probe_failures: self.probe_failures.load(Ordering::Relaxed),
      slow_commands: self.slow_commands.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time snapshot of one pool's counters.
#[derive(Clone, PartialEq, Eq)]
pub struct PoolStats {
  /// Connections currently parked for reuse.
  pub idle: usize,
  /// Connections currently lent out.
  pub in_use: u64,
  /// Successful borrows since the pool was created.
  pub borrowed: u64,
  /// Borrows refused because the pool was at its active limit.
  pub exhausted: u64,
  /// New connections opened.
  pub dials: u64,
  pub dial_failures: u64,
  /// Connections closed instead of being reused (broken, stale, or over the idle limit).
  pub discarded: u64,
  /// Liveness probes sent to long-idle connections.
  pub probes: u64,
  pub probe_failures: u64,
  /// Commands that exceeded the slow-log threshold.
  pub slow_commands: u64,
  pub uptime_secs: u64,
}

impl fmt::Debug for PoolStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PoolStats")
      .field("idle", &self.idle)
      .field("in_use", &self.in_use)
      .field("borrowed", &self.borrowed)
      .field("exhausted", &self.exhausted)
      .field("dials", &self.dials)
      .field("discarded", &self.discarded)
      .field("probe_failures", &self.probe_failures)
      .finish_non_exhaustive()
  }
}
