//! Fixed classification of command verbs.
//!
//! Read-only verbs are routed to a replica by [`RwRedis::execute`](crate::RwRedis::execute).
//! Idempotent verbs may be replayed on a fresh connection after a reset.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use redis::{Arg, Cmd};

static READ_COMMANDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
  [
    "GET", "MGET", "EXISTS", "TTL", "PTTL", "STRLEN", "GETRANGE", "HGET", "HMGET", "HGETALL",
    "HEXISTS", "HKEYS", "HVALS", "HLEN", "LINDEX", "LLEN", "LRANGE", "SCARD", "SISMEMBER",
    "SMEMBERS", "SRANDMEMBER", "ZCARD", "ZCOUNT", "ZRANGE", "ZRANGEBYSCORE", "ZREVRANGE",
    "ZREVRANGEBYSCORE", "ZRANK", "ZREVRANK", "ZSCORE", "TYPE", "SCAN", "PING",
  ]
  .into_iter()
  .collect()
});

static IDEMPOTENT_WRITES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
  [
    "SET", "SETEX", "PSETEX", "MSET", "DEL", "EXPIRE", "PEXPIRE", "HSET", "HDEL", "SADD", "SREM",
    "ZADD", "ZREM",
  ]
  .into_iter()
  .collect()
});

/// Returns the upper-cased verb of a command, or an empty string for an empty command.
pub fn verb(cmd: &Cmd) -> String {
  match cmd.args_iter().next() {
    Some(Arg::Simple(bytes)) => String::from_utf8_lossy(bytes).to_ascii_uppercase(),
    _ => String::new(),
  }
}

pub fn is_read_command(verb: &str) -> bool {
  READ_COMMANDS.contains(verb.to_ascii_uppercase().as_str())
}

pub fn is_idempotent_command(verb: &str) -> bool {
  let verb = verb.to_ascii_uppercase();
  READ_COMMANDS.contains(verb.as_str()) || IDEMPOTENT_WRITES.contains(verb.as_str())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_verb() {
    let mut cmd = redis::cmd("get");
    cmd.arg("user:1");
    assert_eq!(verb(&cmd), "GET");
  }

  #[test]
  fn classifies_reads_and_writes() {
    assert!(is_read_command("GET"));
    assert!(is_read_command("mget"));
    assert!(is_read_command("EXISTS"));
    assert!(!is_read_command("SETEX"));
    assert!(!is_read_command("DEL"));
    assert!(!is_read_command("INCR"));
  }

  #[test]
  fn classifies_idempotency() {
    assert!(is_idempotent_command("GET"));
    assert!(is_idempotent_command("SETEX"));
    assert!(is_idempotent_command("del"));
    assert!(!is_idempotent_command("INCR"));
    assert!(!is_idempotent_command("LPUSH"));
    assert!(!is_idempotent_command(""));
  }
}
