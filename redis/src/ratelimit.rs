use std::fmt;
use std::time::Instant;

use parking_lot::Mutex;

/// A non-blocking source of permits.
pub trait RateLimiter: Send + Sync {
  /// Takes up to `count` immediately available tokens and returns how many were taken.
  /// Returns zero when nothing is available; never waits.
  fn take_available(&self, count: u64) -> u64;
}

#[derive(Debug)]
struct BucketState {
  tokens: f64,
  last_refill: Instant,
}

/// A token bucket holding up to `capacity` tokens, refilled continuously at
/// `rate` tokens per second. The bucket starts full.
pub struct TokenBucket {
  capacity: u64,
  rate: f64,
  state: Mutex<BucketState>,
}

impl TokenBucket {
  pub fn new(rate_per_second: f64, capacity: u64) -> Self {
    Self {
      capacity,
      rate: rate_per_second.max(0.0),
      state: Mutex::new(BucketState {
        tokens: capacity as f64,
        last_refill: Instant::now(),
      }),
    }
  }

  pub fn capacity(&self) -> u64 {
    self.capacity
  }

  /// The number of whole tokens currently available.
  pub fn available(&self) -> u64 {
    let mut state = self.state.lock();
    self.refill(&mut state);
    state.tokens.floor() as u64
  }

  fn refill(&self, state: &mut BucketState) {
    let now = Instant::now();
    let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
    state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity as f64);
    state.last_refill = now;
  }
}

impl RateLimiter for TokenBucket {
  fn take_available(&self, count: u64) -> u64 {
    if count == 0 {
      return 0;
    }
    let mut state = self.state.lock();
    self.refill(&mut state);
    let taken = (state.tokens.floor() as u64).min(count);
    state.tokens -= taken as f64;
    taken
  }
}

impl fmt::Debug for TokenBucket {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TokenBucket")
      .field("capacity", &self.capacity)
      .field("rate", &self.rate)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn starts_full_and_drains() {
    let bucket = TokenBucket::new(1.0, 3);
    assert_eq!(bucket.take_available(2), 2);
    assert_eq!(bucket.take_available(5), 1);
    assert_eq!(bucket.take_available(1), 0);
  }

  #[test]
  fn refills_over_time_up_to_capacity() {
    let bucket = TokenBucket::new(200.0, 2);
    assert_eq!(bucket.take_available(2), 2);
    thread::sleep(Duration::from_millis(50));
    // 50ms at 200/s would be 10 tokens, but capacity caps it at 2.
    assert_eq!(bucket.available(), 2);
  }

  #[test]
  fn zero_rate_never_refills() {
    let bucket = TokenBucket::new(0.0, 1);
    assert_eq!(bucket.take_available(1), 1);
    thread::sleep(Duration::from_millis(5));
    assert_eq!(bucket.take_available(1), 0);
  }
}
