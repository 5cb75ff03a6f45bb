//! The registry of named clients.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::rwredis::RwRedis;

/// Named [`RwRedis`] clients, built once at service start and shared by reference.
///
/// Lookups are safe from any number of tasks. Registration of a given name is
/// atomic: the first writer wins and later ones get `AlreadyRegistered`.
#[derive(Default)]
pub struct ClientRegistry {
  clients: DashMap<String, Arc<RwRedis>>,
}

impl ClientRegistry {
  /// Creates a new, empty `ClientRegistry`.
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds and registers a TCP client for every entry of `config`.
  pub fn from_config(config: &Config) -> Result<Self> {
    let registry = Self::new();
    for client in config.clients.values() {
      registry.register(client.name.clone(), RwRedis::from_config(client)?)?;
    }
    Ok(registry)
  }

  pub fn register(&self, name: impl Into<String>, client: RwRedis) -> Result<Arc<RwRedis>> {
    match self.clients.entry(name.into()) {
      Entry::Occupied(occupied) => Err(Error::AlreadyRegistered(occupied.key().clone())),
      Entry::Vacant(vacant) => {
        let client = Arc::new(client);
        vacant.insert(client.clone());
        Ok(client)
      }
    }
  }

  pub fn get(&self, name: &str) -> Option<Arc<RwRedis>> {
    self.clients.get(name).map(|entry| entry.value().clone())
  }

  /// Like [`get`](Self::get) but reports a missing name as an error.
  pub fn require(&self, name: &str) -> Result<Arc<RwRedis>> {
    self.get(name).ok_or_else(|| Error::UnknownClient(name.to_string()))
  }

  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.clients.iter().map(|e| e.key().clone()).collect();
    names.sort();
    names
  }

  pub fn len(&self) -> usize {
    self.clients.len()
  }

  pub fn is_empty(&self) -> bool {
    self.clients.is_empty()
  }

  /// Closes the idle connections of every registered client.
  pub fn close_all(&self) {
    for entry in self.clients.iter() {
      entry.value().close();
    }
  }
}
