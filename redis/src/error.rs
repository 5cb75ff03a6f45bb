use std::io;

use thiserror::Error;

/// The error type for connection, pool and client operations.
#[derive(Debug, Error)]
pub enum Error {
  /// An error reported by the `redis` client, including server error replies.
  #[error("redis error: {0}")]
  Redis(#[from] redis::RedisError),

  /// A raw transport error raised by a connection.
  #[error("connection i/o error: {0}")]
  Io(#[from] io::Error),

  /// No connection could be borrowed within the pool's wait policy.
  #[error("connection pool exhausted for {addr}")]
  PoolExhausted { addr: String },

  /// The pool was closed and no longer hands out connections.
  #[error("connection pool closed for {addr}")]
  PoolClosed { addr: String },

  #[error("invalid address: {0}")]
  InvalidAddress(String),

  #[error("failed to read configuration file: {0}")]
  ConfigRead(#[source] io::Error),

  #[error("failed to parse configuration: {0}")]
  ConfigParse(String),

  #[error("invalid configuration value for '{field}': {message}")]
  InvalidConfigValue { field: String, message: String },

  #[error("a client named '{0}' is already registered")]
  AlreadyRegistered(String),

  #[error("no client named '{0}' is registered")]
  UnknownClient(String),

  /// A reply did not have the shape the caller asked for.
  #[error("unexpected reply: {0}")]
  UnexpectedReply(String),
}

impl Error {
  /// Returns `true` for network-level timeouts (connect, read or write).
  pub fn is_timeout(&self) -> bool {
    match self {
      Error::Redis(e) => e.is_timeout(),
      Error::Io(e) => matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock),
      _ => false,
    }
  }

  /// Returns `true` when the peer reset or closed the connection.
  pub fn is_connection_dropped(&self) -> bool {
    match self {
      Error::Redis(e) => e.is_connection_dropped(),
      Error::Io(e) => matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
          | io::ErrorKind::ConnectionAborted
          | io::ErrorKind::BrokenPipe
          | io::ErrorKind::UnexpectedEof
      ),
      _ => false,
    }
  }

  /// Returns `true` for errors that leave the connection in an unknown state.
  pub(crate) fn is_io(&self) -> bool {
    match self {
      Error::Redis(e) => e.is_io_error() || e.is_timeout() || e.is_connection_dropped(),
      Error::Io(_) => true,
      _ => false,
    }
  }

  /// Returns `true` for errors worth retrying: timeouts, resets and pool exhaustion.
  pub fn is_transient(&self) -> bool {
    self.is_timeout() || self.is_connection_dropped() || matches!(self, Error::PoolExhausted { .. })
  }
}

/// A specialized `Result` type for `zcache_redis` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_io_errors() {
    let timeout = Error::from(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
    assert!(timeout.is_timeout());
    assert!(!timeout.is_connection_dropped());
    assert!(timeout.is_transient());

    let reset = Error::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"));
    assert!(reset.is_connection_dropped());
    assert!(!reset.is_timeout());

    let eof = Error::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
    assert!(eof.is_connection_dropped());
  }

  #[test]
  fn contract_errors_are_not_transient() {
    let err = Error::InvalidAddress("redis://:6379".into());
    assert!(!err.is_transient());
    assert!(!err.is_io());
  }
}
