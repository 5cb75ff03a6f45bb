#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zcache_redis::mock::MockServer;
use zcache_redis::{PoolConfig, RetryConfig, RwRedis};
use zcache_store::{Compression, RedisCache, RedisCacheOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  pub id: u64,
  pub name: String,
  pub tags: Vec<String>,
}

pub fn profile(id: u64) -> Profile {
  Profile {
    id,
    name: format!("user-{id}"),
    tags: vec!["reader".to_string(), "<b>&</b>".to_string()],
  }
}

pub fn keys(names: &[&str]) -> Vec<String> {
  names.iter().map(|k| k.to_string()).collect()
}

/// One primary and one replica sharing a keyspace, behind a client.
pub struct Cluster {
  pub primary: MockServer,
  pub replica: MockServer,
  pub client: Arc<RwRedis>,
}

pub fn cluster() -> Cluster {
  let primary = MockServer::new("10.0.0.1:6379");
  let replica = primary.replica("10.0.0.2:6379");
  let client = RwRedis::with_dialers(
    "cache",
    primary.dialer(),
    vec![replica.dialer()],
    PoolConfig::default(),
    RetryConfig::default(),
  );
  Cluster {
    primary,
    replica,
    client: Arc::new(client),
  }
}

pub fn redis_cache(cluster: &Cluster, compression: Compression) -> RedisCache {
  RedisCache::new(
    cluster.client.clone(),
    RedisCacheOptions::default().compression(compression),
  )
}
