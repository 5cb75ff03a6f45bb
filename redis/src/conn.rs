//! The seam between the pool and the wire.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncConnectionConfig, Cmd, Value};

use crate::address::Address;
use crate::error::Result;

/// One network connection. Not shared: exactly one operation (or one
/// pipelined batch) owns it at a time.
#[async_trait]
pub trait Connection: Send {
  /// Sends one command and reads its reply.
  async fn request(&mut self, cmd: &Cmd) -> Result<Value>;

  /// Sends every command, flushes once, then reads the replies in request order.
  async fn pipeline(&mut self, cmds: &[Cmd]) -> Result<Vec<Value>>;
}

/// Opens new connections to one endpoint.
#[async_trait]
pub trait Dialer: Send + Sync {
  async fn dial(&self) -> Result<Box<dyn Connection>>;

  /// The endpoint this dialer connects to.
  fn address(&self) -> &Address;
}

/// Dials a Redis endpoint over TCP through the `redis` crate.
pub struct TcpDialer {
  client: redis::Client,
  address: Address,
  connect_timeout: Duration,
  response_timeout: Duration,
}

impl TcpDialer {
  /// Creates a dialer for `raw_url`. The response timeout covers writing the
  /// request and reading the reply, so it is the sum of both budgets.
  pub fn new(
    raw_url: &str,
    connect_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
  ) -> Result<Self> {
    let address = Address::parse(raw_url)?;
    let client = redis::Client::open(raw_url)?;
    Ok(Self {
      client,
      address,
      connect_timeout,
      response_timeout: read_timeout + write_timeout,
    })
  }
}

impl fmt::Debug for TcpDialer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TcpDialer")
      .field("address", &self.address)
      .field("connect_timeout", &self.connect_timeout)
      .field("response_timeout", &self.response_timeout)
      .finish()
  }
}

#[async_trait]
impl Dialer for TcpDialer {
  async fn dial(&self) -> Result<Box<dyn Connection>> {
    let mut config = AsyncConnectionConfig::new();
    if !self.connect_timeout.is_zero() {
      config = config.set_connection_timeout(self.connect_timeout);
    }
    if !self.response_timeout.is_zero() {
      config = config.set_response_timeout(self.response_timeout);
    }
    let inner = self.client.get_multiplexed_async_connection_with_config(&config).await?;
    Ok(Box::new(TcpConnection { inner }))
  }

  fn address(&self) -> &Address {
    &self.address
  }
}

struct TcpConnection {
  inner: MultiplexedConnection,
}

#[async_trait]
impl Connection for TcpConnection {
  async fn request(&mut self, cmd: &Cmd) -> Result<Value> {
    Ok(cmd.query_async::<Value>(&mut self.inner).await?)
  }

  async fn pipeline(&mut self, cmds: &[Cmd]) -> Result<Vec<Value>> {
    let mut pipe = redis::pipe();
    for cmd in cmds {
      pipe.add_command(cmd.clone());
    }
    Ok(pipe.query_async::<Vec<Value>>(&mut self.inner).await?)
  }
}
