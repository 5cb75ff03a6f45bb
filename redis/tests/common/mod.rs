#![allow(dead_code)]

use zcache_redis::mock::MockServer;
use zcache_redis::{cmd, Cmd, Pool, PoolConfig, RetryConfig, RwRedis};

pub fn command(verb: &str, args: &[&str]) -> Cmd {
  let mut c = cmd(verb);
  for arg in args {
    c.arg(*arg);
  }
  c
}

pub fn build_pool(server: &MockServer, config: PoolConfig) -> Pool {
  Pool::new(server.dialer(), config)
}

/// A primary plus `replicas` replicas sharing its keyspace.
pub fn build_cluster(replicas: usize) -> (MockServer, Vec<MockServer>) {
  let primary = MockServer::new("10.0.0.1:6379");
  let reads = (0..replicas)
    .map(|i| primary.replica(&format!("10.0.0.{}:6379", i + 2)))
    .collect();
  (primary, reads)
}

pub fn build_client(primary: &MockServer, replicas: &[MockServer], retry: RetryConfig) -> RwRedis {
  RwRedis::with_dialers(
    "test",
    primary.dialer(),
    replicas.iter().map(MockServer::dialer).collect(),
    PoolConfig::default(),
    retry,
  )
}
