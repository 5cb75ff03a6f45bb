use std::{future::Future, pin::Pin};

/// Spawns detached cache writes onto an asynchronous runtime.
pub trait TaskSpawner: Send + Sync + 'static {
  /// Spawns a type-erased future.
  fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>);
}

pub struct TokioSpawner(tokio::runtime::Handle);

impl TokioSpawner {
  pub fn new(handle: tokio::runtime::Handle) -> Self {
    Self(handle)
  }

  /// A spawner for the runtime of the calling context, if there is one.
  pub fn try_current() -> Option<Self> {
    tokio::runtime::Handle::try_current().ok().map(Self)
  }
}

impl TaskSpawner for TokioSpawner {
  fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>) {
    self.0.spawn(future);
  }
}
