mod common;

use std::time::Duration;

use common::{keys, profile, Profile};
use pretty_assertions::assert_eq;
use zcache_store::{Cache, CacheError, LocalCache};

const TTL: Duration = Duration::from_secs(30);

#[tokio::test]
async fn test_local_set_then_get_returns_value() {
  let cache = LocalCache::new(16);
  cache.set("profile:1", &profile(1), TTL).await.unwrap();

  let back: Profile = cache.get("profile:1").await.unwrap();
  assert_eq!(back, profile(1));
  assert!(cache.exists("profile:1").await.unwrap());
}

#[tokio::test]
async fn test_local_miss_is_not_found() {
  let cache = LocalCache::new(16);
  let err = cache.get::<Profile>("absent").await.unwrap_err();
  assert!(err.is_not_found());
  assert!(!cache.exists("absent").await.unwrap());
  assert_eq!(cache.metrics().misses, 1);
}

#[tokio::test]
async fn test_local_evicts_least_recently_used() {
  let cache = LocalCache::new(3);
  for key in ["a", "b", "c"] {
    cache.set(key, &key.to_string(), TTL).await.unwrap();
  }

  // Reading "a" makes "b" the least recently used.
  let _: String = cache.get("a").await.unwrap();
  cache.set("d", &"d".to_string(), TTL).await.unwrap();

  assert_eq!(
    cache.exists_multi(&keys(&["a", "b", "c", "d"])).await.unwrap(),
    vec![true, false, true, true]
  );
  assert_eq!(cache.len(), 3);
  assert_eq!(cache.metrics().evicted_by_capacity, 1);
}

#[tokio::test]
async fn test_local_rewrite_refreshes_recency() {
  let cache = LocalCache::new(2);
  cache.set("a", &1u32, TTL).await.unwrap();
  cache.set("b", &2u32, TTL).await.unwrap();
  cache.set("a", &10u32, TTL).await.unwrap();
  cache.set("c", &3u32, TTL).await.unwrap();

  assert!(cache.get::<u32>("b").await.unwrap_err().is_not_found());
  assert_eq!(cache.get::<u32>("a").await.unwrap(), 10);

  let metrics = cache.metrics();
  assert_eq!(metrics.inserts, 3);
  assert_eq!(metrics.updates, 1);
}

#[tokio::test]
async fn test_local_get_multi_returns_hits_only() {
  let cache = LocalCache::new(16);
  cache
    .set_multi(&keys(&["a", "c"]), &[profile(1), profile(3)], TTL)
    .await
    .unwrap();

  let found = cache.get_multi::<Profile>(&keys(&["a", "b", "c"])).await.unwrap();
  assert_eq!(found.len(), 2);
  assert_eq!(found["a"], profile(1));
  assert_eq!(found["c"], profile(3));
  assert!(!found.contains_key("b"));
}

#[tokio::test]
async fn test_local_set_multi_rejects_length_mismatch() {
  let cache = LocalCache::new(16);
  let err = cache
    .set_multi(&keys(&["a", "b"]), &[1u8], TTL)
    .await
    .unwrap_err();
  assert!(matches!(err, CacheError::LengthMismatch { keys: 2, values: 1 }));
  assert!(cache.is_empty());
}

#[tokio::test]
async fn test_local_type_mismatch_is_fatal() {
  let cache = LocalCache::new(16);
  cache.set("n", &42i64, TTL).await.unwrap();

  let err = cache.get::<String>("n").await.unwrap_err();
  assert!(err.is_fatal());
  match err {
    CacheError::TypeMismatch { expected, found } => {
      assert_eq!(expected, "alloc::string::String");
      assert_eq!(found, "i64");
    }
    other => panic!("expected TypeMismatch, got {other:?}"),
  }

  let err = cache.get_multi::<String>(&keys(&["n"])).await.unwrap_err();
  assert!(matches!(err, CacheError::TypeMismatch { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_local_entries_expire() {
  let cache = LocalCache::new(16);
  cache.set("short", &1u8, Duration::from_secs(5)).await.unwrap();
  cache.set("long", &2u8, Duration::from_secs(60)).await.unwrap();

  tokio::time::advance(Duration::from_secs(6)).await;

  assert!(!cache.exists("short").await.unwrap());
  assert!(cache.get::<u8>("short").await.unwrap_err().is_not_found());
  assert_eq!(cache.get::<u8>("long").await.unwrap(), 2);

  let metrics = cache.metrics();
  assert_eq!(metrics.evicted_by_ttl, 1);
  assert_eq!(metrics.size, 1);
}

#[tokio::test(start_paused = true)]
async fn test_local_zero_ttl_uses_default() {
  let with_default = LocalCache::new(16).with_default_ttl(Duration::from_secs(10));
  let without_default = LocalCache::new(16);
  with_default.set("k", &1u8, Duration::ZERO).await.unwrap();
  without_default.set("k", &1u8, Duration::ZERO).await.unwrap();

  tokio::time::advance(Duration::from_secs(3600)).await;

  assert!(!with_default.exists("k").await.unwrap());
  assert!(without_default.exists("k").await.unwrap(), "no default means no expiry");
}

#[tokio::test]
async fn test_local_delete_ignores_absent_keys() {
  let cache = LocalCache::new(16);
  cache.set("a", &1u8, TTL).await.unwrap();
  cache.delete(&keys(&["a", "missing"])).await.unwrap();
  cache.delete(&[]).await.unwrap();

  assert!(!cache.exists("a").await.unwrap());
  assert_eq!(cache.metrics().invalidations, 1);
}

#[tokio::test]
async fn test_local_must_variants() {
  let cache = LocalCache::new(16);
  cache.must_set("a", &"x".to_string(), TTL).await;
  assert_eq!(cache.must_get::<String>("a").await, "x");
  assert!(cache.must_exists("a").await);
  cache.must_delete(&keys(&["a"])).await;
  assert_eq!(cache.must_exists_multi(&keys(&["a"])).await, vec![false]);
}

#[tokio::test]
#[should_panic(expected = "cache: key not found")]
async fn test_local_must_get_panics_on_miss() {
  let cache = LocalCache::new(16);
  cache.must_get::<String>("absent").await;
}
