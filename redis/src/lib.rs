//! A read/write split Redis client built for cache traffic.
//!
//! # Features
//! - **Per-endpoint pools**: Bounded idle/active limits, connection lifetime,
//!   idle timeout, and a liveness probe only for connections idle ≥ 10 seconds.
//! - **Read/write split**: One primary pool for writes, round-robin over replica
//!   pools for read-only verbs.
//! - **Retry policy**: One retry on network timeout, gated by a per-client
//!   token bucket; transparent reconnect-and-retry on reset for idempotent verbs.
//! - **Scoped borrowing**: Connections are RAII guards returned to their pool on drop.
//! - **Registry**: Named clients built from a YAML configuration file.

pub mod address;
pub mod command;
pub mod config;
pub mod conn;
pub mod error;
pub mod pool;
pub mod ratelimit;
pub mod registry;
pub mod rwredis;

mod metrics;

#[cfg(feature = "mock")]
pub mod mock;

pub use address::Address;
pub use config::{ClientConfig, Config, PoolConfig, RetryConfig};
pub use conn::{Connection, Dialer, TcpDialer};
pub use error::{Error, Result};
pub use metrics::PoolStats;
pub use pool::{Pool, PooledConnection};
pub use ratelimit::{RateLimiter, TokenBucket};
pub use registry::ClientRegistry;
pub use rwredis::RwRedis;

// Reply and command types callers need to talk to a client.
pub use redis::{cmd, from_redis_value, Cmd, FromRedisValue, Value};
