use thiserror::Error;

/// The error type for every [`Cache`](crate::Cache) operation.
#[derive(Debug, Error)]
pub enum CacheError {
  /// The key is absent or has expired. Drives the fallback path; not a fault.
  #[error("cache: key not found")]
  NotFound,

  /// The stored payload could not be parsed.
  #[error("cache: failed to decode payload: {0}")]
  Decode(String),

  /// The stored value does not have the shape the caller asked for.
  #[error("cache: type mismatch, expected {expected}, found {found}")]
  TypeMismatch { expected: String, found: String },

  /// A batch write was given a different number of keys and values.
  #[error("cache: {keys} keys but {values} values")]
  LengthMismatch { keys: usize, values: usize },

  #[error("cache: failed to encode value: {0}")]
  Encode(String),

  /// The distributed backend failed (network, pool or server error).
  #[error("cache backend: {0}")]
  Backend(#[from] zcache_redis::Error),
}

impl CacheError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, CacheError::NotFound)
  }

  /// Returns `true` for contract and schema violations that retrying cannot fix.
  pub fn is_fatal(&self) -> bool {
    matches!(
      self,
      CacheError::TypeMismatch { .. }
        | CacheError::LengthMismatch { .. }
        | CacheError::Decode(_)
        | CacheError::Encode(_)
    )
  }

  pub(crate) fn type_mismatch<T>(found: impl Into<String>) -> Self {
    CacheError::TypeMismatch {
      expected: std::any::type_name::<T>().to_string(),
      found: found.into(),
    }
  }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;

/// Unwraps `result`, panicking with the error's display text.
pub(crate) fn must<T>(result: Result<T>) -> T {
  match result {
    Ok(value) => value,
    Err(e) => panic!("{e}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_errors() {
    assert!(CacheError::NotFound.is_not_found());
    assert!(!CacheError::NotFound.is_fatal());
    assert!(CacheError::LengthMismatch { keys: 2, values: 1 }.is_fatal());
    assert!(CacheError::type_mismatch::<u32>("alloc::string::String").is_fatal());

    let backend = CacheError::from(zcache_redis::Error::UnknownClient("x".into()));
    assert!(!backend.is_fatal());
    assert!(!backend.is_not_found());
  }

  #[test]
  fn type_mismatch_names_both_types() {
    let err = CacheError::type_mismatch::<Vec<u8>>("i64");
    assert_eq!(
      err.to_string(),
      "cache: type mismatch, expected alloc::vec::Vec<u8>, found i64"
    );
  }
}
