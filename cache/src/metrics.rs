use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use tokio::time::Instant;

/// Lock-free counters for a [`LocalCache`](crate::LocalCache).
#[derive(Debug)]
pub(crate) struct Metrics {
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) updates: CachePadded<AtomicU64>,
  pub(crate) invalidations: CachePadded<AtomicU64>,

  pub(crate) evicted_by_capacity: CachePadded<AtomicU64>,
  pub(crate) evicted_by_ttl: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      updates: CachePadded::new(AtomicU64::new(0)),
      invalidations: CachePadded::new(AtomicU64::new(0)),
      evicted_by_capacity: CachePadded::new(AtomicU64::new(0)),
      evicted_by_ttl: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn snapshot(&self, size: usize, capacity: usize) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      inserts: self.inserts.load(Ordering::Relaxed),
      updates: self.updates.load(Ordering::Relaxed),
      invalidations: self.invalidations.load(Ordering::Relaxed),
      evicted_by_capacity: self.evicted_by_capacity.load(Ordering::Relaxed),
      evicted_by_ttl: self.evicted_by_ttl.load(Ordering::Relaxed),
      size,
      capacity,
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time snapshot of a local cache's counters.
#[derive(Clone)]
pub struct MetricsSnapshot {
  pub hits: u64,
  /// Lookups of absent or expired keys.
  pub misses: u64,
  /// hits / (hits + misses), or zero before the first lookup.
  pub hit_ratio: f64,
  /// Writes of keys that were not present.
  pub inserts: u64,
  /// Writes that replaced a live entry.
  pub updates: u64,
  /// Entries removed by `delete`.
  pub invalidations: u64,
  pub evicted_by_capacity: u64,
  /// Expired entries dropped when they were next looked up or overwritten.
  pub evicted_by_ttl: u64,
  /// Entries currently held, including expired ones not yet dropped.
  pub size: usize,
  pub capacity: usize,
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("inserts", &self.inserts)
      .field("updates", &self.updates)
      .field("invalidations", &self.invalidations)
      .field("evicted_by_capacity", &self.evicted_by_capacity)
      .field("evicted_by_ttl", &self.evicted_by_ttl)
      .field("size", &self.size)
      .field("capacity", &self.capacity)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
