use thiserror::Error;
use zcache_store::CacheError;

/// A boxed error returned by a fallback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type for [`ZCache`](crate::ZCache) operations.
#[derive(Debug, Error)]
pub enum Error {
  /// The cache failed and the failure could not be served around.
  #[error(transparent)]
  Cache(#[from] CacheError),

  /// The fallback failed. Always surfaced as-is.
  #[error("fallback failed: {0}")]
  Fallback(#[source] BoxError),
}

impl Error {
  pub fn is_fallback(&self) -> bool {
    matches!(self, Error::Fallback(_))
  }

  /// The cache error, if this is one.
  pub fn as_cache_error(&self) -> Option<&CacheError> {
    match self {
      Error::Cache(e) => Some(e),
      Error::Fallback(_) => None,
    }
  }

  pub(crate) fn fallback(e: impl Into<BoxError>) -> Self {
    Error::Fallback(e.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) fn must<T>(result: Result<T>) -> T {
  match result {
    Ok(value) => value,
    Err(e) => panic!("zcache: {e}"),
  }
}
