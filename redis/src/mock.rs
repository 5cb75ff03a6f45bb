//! An in-memory stand-in for a Redis endpoint, for tests.
//!
//! Speaks the handful of commands the cache layers use, counts what it sees,
//! and fails requests on demand. Replicas created with [`MockServer::replica`]
//! share the primary's keyspace but keep their own counters and faults.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::{Arg, Cmd, Value};
use tokio::time::Instant;

use crate::address::Address;
use crate::conn::{Connection, Dialer};
use crate::error::{Error, Result};

/// A failure injected into the next request that reaches a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
  /// The request times out.
  Timeout,
  /// The peer resets the connection; the connection stays dead afterwards.
  Reset,
  /// The peer closes the stream; the connection stays dead afterwards.
  Eof,
  /// The request never completes.
  Stall,
}

struct Stored {
  value: Vec<u8>,
  expires_at: Option<Instant>,
}

type Keyspace = Arc<Mutex<HashMap<Vec<u8>, Stored>>>;

struct ServerState {
  address: Address,
  keyspace: Keyspace,
  faults: Mutex<VecDeque<Fault>>,
  dial_failures: AtomicU64,
  dials: AtomicU64,
  requests: AtomicU64,
  pings: AtomicU64,
  log: Mutex<Vec<String>>,
}

/// A mock endpoint. Cheap to clone; clones are the same server.
#[derive(Clone)]
pub struct MockServer {
  state: Arc<ServerState>,
}

impl MockServer {
  /// Creates a server with an empty keyspace listening (notionally) on `addr`,
  /// given as `host:port`.
  pub fn new(addr: &str) -> Self {
    Self::with_keyspace(addr, Arc::new(Mutex::new(HashMap::new())))
  }

  /// Creates a replica that serves the same keyspace as `self`.
  pub fn replica(&self, addr: &str) -> Self {
    Self::with_keyspace(addr, self.state.keyspace.clone())
  }

  fn with_keyspace(addr: &str, keyspace: Keyspace) -> Self {
    let address = Address::parse(&format!("redis://{addr}"))
      .unwrap_or_else(|e| panic!("mock server address '{addr}': {e}"));
    Self {
      state: Arc::new(ServerState {
        address,
        keyspace,
        faults: Mutex::new(VecDeque::new()),
        dial_failures: AtomicU64::new(0),
        dials: AtomicU64::new(0),
        requests: AtomicU64::new(0),
        pings: AtomicU64::new(0),
        log: Mutex::new(Vec::new()),
      }),
    }
  }

  pub fn dialer(&self) -> Arc<dyn Dialer> {
    Arc::new(MockDialer {
      state: self.state.clone(),
    })
  }

  pub fn address(&self) -> &Address {
    &self.state.address
  }

  /// Queues a fault for the next request (faults are consumed in order).
  pub fn inject(&self, fault: Fault) {
    self.state.faults.lock().push_back(fault);
  }

  /// Makes the next `n` dials fail with a refused connection.
  pub fn refuse_dials(&self, n: u64) {
    self.state.dial_failures.store(n, Ordering::SeqCst);
  }

  /// Requests received, excluding liveness probes. A pipeline counts once.
  pub fn requests(&self) -> u64 {
    self.state.requests.load(Ordering::SeqCst)
  }

  pub fn pings(&self) -> u64 {
    self.state.pings.load(Ordering::SeqCst)
  }

  pub fn dials(&self) -> u64 {
    self.state.dials.load(Ordering::SeqCst)
  }

  /// The verbs received so far, in arrival order, excluding liveness probes.
  pub fn commands(&self) -> Vec<String> {
    self.state.log.lock().clone()
  }

  pub fn raw_get(&self, key: &str) -> Option<Vec<u8>> {
    let now = Instant::now();
    let keyspace = self.state.keyspace.lock();
    keyspace
      .get(key.as_bytes())
      .filter(|s| s.expires_at.map_or(true, |at| at > now))
      .map(|s| s.value.clone())
  }

  pub fn raw_set(&self, key: &str, value: impl Into<Vec<u8>>) {
    self.state.keyspace.lock().insert(
      key.as_bytes().to_vec(),
      Stored {
        value: value.into(),
        expires_at: None,
      },
    );
  }

  /// Remaining time to live of `key`, if it exists and has one.
  pub fn ttl(&self, key: &str) -> Option<Duration> {
    let keyspace = self.state.keyspace.lock();
    keyspace
      .get(key.as_bytes())
      .and_then(|s| s.expires_at)
      .map(|at| at.saturating_duration_since(Instant::now()))
  }
}

struct MockDialer {
  state: Arc<ServerState>,
}

#[async_trait]
impl Dialer for MockDialer {
  async fn dial(&self) -> Result<Box<dyn Connection>> {
    let refused = self
      .state
      .dial_failures
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if refused {
      return Err(Error::Io(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "mock dial refused",
      )));
    }
    self.state.dials.fetch_add(1, Ordering::SeqCst);
    Ok(Box::new(MockConnection {
      state: self.state.clone(),
      dead: None,
    }))
  }

  fn address(&self) -> &Address {
    &self.state.address
  }
}

struct MockConnection {
  state: Arc<ServerState>,
  dead: Option<io::ErrorKind>,
}

impl MockConnection {
  async fn admit(&mut self, verb: &str) -> Result<()> {
    if verb == "PING" {
      self.state.pings.fetch_add(1, Ordering::SeqCst);
    } else {
      self.state.requests.fetch_add(1, Ordering::SeqCst);
      self.state.log.lock().push(verb.to_string());
    }

    if let Some(kind) = self.dead {
      return Err(Error::Io(io::Error::new(kind, "mock connection is closed")));
    }

    let fault = self.state.faults.lock().pop_front();
    match fault {
      None => Ok(()),
      Some(Fault::Timeout) => Err(Error::Io(io::Error::new(io::ErrorKind::TimedOut, "mock i/o timeout"))),
      Some(Fault::Reset) => {
        self.dead = Some(io::ErrorKind::ConnectionReset);
        Err(Error::Io(io::Error::new(io::ErrorKind::ConnectionReset, "mock connection reset")))
      }
      Some(Fault::Eof) => {
        self.dead = Some(io::ErrorKind::UnexpectedEof);
        Err(Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "mock eof")))
      }
      Some(Fault::Stall) => std::future::pending().await,
    }
  }

  fn apply(&self, args: &[Vec<u8>]) -> Result<Value> {
    let verb = args
      .first()
      .map(|v| String::from_utf8_lossy(v).to_ascii_uppercase())
      .unwrap_or_default();
    let now = Instant::now();
    let mut keyspace = self.state.keyspace.lock();
    keyspace.retain(|_, s| s.expires_at.map_or(true, |at| at > now));

    let arity = |n: usize| -> Result<()> {
      if args.len() < n {
        Err(response_error("wrong number of arguments"))
      } else {
        Ok(())
      }
    };

    match verb.as_str() {
      "PING" => Ok(Value::SimpleString("PONG".to_string())),
      "GET" => {
        arity(2)?;
        Ok(bulk_or_nil(keyspace.get(&args[1])))
      }
      "MGET" => {
        arity(2)?;
        Ok(Value::Array(
          args[1..].iter().map(|k| bulk_or_nil(keyspace.get(k))).collect(),
        ))
      }
      "SET" => {
        arity(3)?;
        keyspace.insert(
          args[1].clone(),
          Stored {
            value: args[2].clone(),
            expires_at: None,
          },
        );
        Ok(Value::Okay)
      }
      "SETEX" => {
        arity(4)?;
        let secs: u64 = String::from_utf8_lossy(&args[2])
          .parse()
          .map_err(|_| response_error("value is not an integer or out of range"))?;
        if secs == 0 {
          return Err(response_error("invalid expire time in 'setex' command"));
        }
        keyspace.insert(
          args[1].clone(),
          Stored {
            value: args[3].clone(),
            expires_at: Some(now + Duration::from_secs(secs)),
          },
        );
        Ok(Value::Okay)
      }
      "EXISTS" => {
        arity(2)?;
        let found = args[1..].iter().filter(|k| keyspace.contains_key(*k)).count();
        Ok(Value::Int(found as i64))
      }
      "DEL" => {
        arity(2)?;
        let removed = args[1..].iter().filter(|k| keyspace.remove(*k).is_some()).count();
        Ok(Value::Int(removed as i64))
      }
      "INCR" => {
        arity(2)?;
        let current = keyspace
          .get(&args[1])
          .map(|s| String::from_utf8_lossy(&s.value).parse::<i64>())
          .transpose()
          .map_err(|_| response_error("value is not an integer or out of range"))?
          .unwrap_or(0);
        let next = current + 1;
        keyspace.insert(
          args[1].clone(),
          Stored {
            value: next.to_string().into_bytes(),
            expires_at: None,
          },
        );
        Ok(Value::Int(next))
      }
      _ => Err(response_error("unknown command")),
    }
  }
}

#[async_trait]
impl Connection for MockConnection {
  async fn request(&mut self, cmd: &Cmd) -> Result<Value> {
    let args = arguments(cmd);
    let verb = args
      .first()
      .map(|v| String::from_utf8_lossy(v).to_ascii_uppercase())
      .unwrap_or_default();
    self.admit(&verb).await?;
    self.apply(&args)
  }

  async fn pipeline(&mut self, cmds: &[Cmd]) -> Result<Vec<Value>> {
    self.admit("PIPELINE").await?;
    cmds.iter().map(|cmd| self.apply(&arguments(cmd))).collect()
  }
}

fn arguments(cmd: &Cmd) -> Vec<Vec<u8>> {
  cmd
    .args_iter()
    .map(|arg| match arg {
      Arg::Simple(bytes) => bytes.to_vec(),
      Arg::Cursor => b"0".to_vec(),
    })
    .collect()
}

fn bulk_or_nil(stored: Option<&Stored>) -> Value {
  stored.map_or(Value::Nil, |s| Value::BulkString(s.value.clone()))
}

fn response_error(message: &'static str) -> Error {
  Error::Redis(redis::RedisError::from((redis::ErrorKind::ResponseError, message)))
}
