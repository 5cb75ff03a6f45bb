mod common;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use common::{article, article_key, Article, Calls};
use pretty_assertions::assert_eq;
use zcache::{CacheError, Compression, RedisCache, RedisCacheOptions, RwRedis, TokenBucket, ZCache, ZCacheOptions};
use zcache_redis::mock::{Fault, MockServer};
use zcache_redis::{PoolConfig, RetryConfig};

struct Setup {
  primary: MockServer,
  replica: MockServer,
  zcache: ZCache<RedisCache>,
}

fn setup(options: ZCacheOptions) -> Setup {
  let primary = MockServer::new("10.0.0.1:6379");
  let replica = primary.replica("10.0.0.2:6379");
  let client = RwRedis::with_dialers(
    "articles",
    primary.dialer(),
    vec![replica.dialer()],
    PoolConfig::default(),
    RetryConfig::default(),
  );
  let cache = RedisCache::new(
    Arc::new(client),
    RedisCacheOptions::default().compression(Compression::Zlib),
  );
  Setup {
    primary,
    replica,
    zcache: ZCache::new(Arc::new(cache), options),
  }
}

async fn load(calls: &Calls, id: u64) -> Result<Option<Article>, io::Error> {
  calls.hit();
  Ok(Some(article(id)))
}

#[tokio::test(start_paused = true)]
async fn read_through_writes_to_primary_with_ttl() {
  let s = setup(ZCacheOptions::new(Duration::from_secs(120)));
  let calls = Calls::default();

  for _ in 0..2 {
    let value = s.zcache.get(|| article_key(&1), || load(&calls, 1), None).await.unwrap();
    assert_eq!(value, Some(article(1)));
  }
  assert_eq!(calls.count(), 1);

  assert_eq!(s.primary.ttl("article:1"), Some(Duration::from_secs(120)));
  assert_eq!(s.primary.commands(), vec!["SETEX".to_string()]);
  assert_eq!(s.replica.commands(), vec!["GET".to_string(), "GET".to_string()]);

  // Stored payloads are zlib framed.
  assert_eq!(s.primary.raw_get("article:1").unwrap()[0], 0x78);
}

#[tokio::test]
async fn batch_read_uses_one_mget_and_one_pipeline() {
  let s = setup(ZCacheOptions::default());
  let calls = Calls::default();
  s.zcache.get(|| article_key(&2), || load(&calls, 2), None).await.unwrap();

  let found: HashMap<u64, Article> = s
    .zcache
    .get_multi(
      &[1, 2, 3],
      article_key,
      |missing| async move { Ok::<_, io::Error>(missing.into_iter().map(|id| (id, article(id))).collect::<Vec<_>>()) },
      None,
    )
    .await
    .unwrap();

  assert_eq!(found.len(), 3);
  assert_eq!(s.replica.commands(), vec!["GET".to_string(), "MGET".to_string()]);
  assert_eq!(s.primary.commands(), vec!["SETEX".to_string(), "PIPELINE".to_string()]);
}

#[tokio::test]
async fn replica_timeout_is_served_by_fallback_within_budget() {
  let s = setup(ZCacheOptions::default().fallback_when_error(true));
  let zcache = s.zcache.with_rate_limiter(Arc::new(TokenBucket::new(0.0, 1)));
  let calls = Calls::default();

  s.replica.inject(Fault::Timeout);
  let value = zcache.get(|| article_key(&1), || load(&calls, 1), None).await.unwrap();
  assert_eq!(value, Some(article(1)));

  s.replica.inject(Fault::Timeout);
  let err = zcache.get(|| article_key(&1), || load(&calls, 1), None).await.unwrap_err();
  assert!(matches!(err.as_cache_error(), Some(CacheError::Backend(e)) if e.is_timeout()));
  assert_eq!(calls.count(), 1);
}

#[tokio::test]
async fn evict_and_refresh_go_to_primary() {
  let s = setup(ZCacheOptions::default());
  let calls = Calls::default();
  s.zcache.get(|| article_key(&1), || load(&calls, 1), None).await.unwrap();

  s.zcache.refresh(|| article_key(&1), || load(&calls, 1), None).await.unwrap();
  s.zcache.evict(|| article_key(&1)).await.unwrap();

  assert_eq!(s.primary.raw_get("article:1"), None);
  assert_eq!(
    s.primary.commands(),
    vec!["SETEX".to_string(), "DEL".to_string(), "SETEX".to_string(), "DEL".to_string()]
  );
}

#[tokio::test]
async fn corrupt_payload_is_repaired_in_degraded_mode() {
  let s = setup(ZCacheOptions::default().fallback_when_error(true));
  s.primary.raw_set("article:1", b"\x00\x01garbage".to_vec());
  let calls = Calls::default();

  for _ in 0..2 {
    let value = s.zcache.get(|| article_key(&1), || load(&calls, 1), None).await.unwrap();
    assert_eq!(value, Some(article(1)));
  }
  assert_eq!(calls.count(), 1);
  assert_eq!(s.primary.commands(), vec!["SETEX".to_string()]);
}
