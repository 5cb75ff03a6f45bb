use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node<K, V> {
  key: K,
  value: V,
  next: Option<Index>,
  prev: Option<Index>,
}

// An arena-backed doubly linked list ordered by recency, with O(1) lookup.
#[derive(Debug)]
pub(super) struct LruList<K: Eq + Hash + Clone, V> {
  nodes: Arena<Node<K, V>>,
  lookup: HashMap<K, Index>,
  // Most recently used.
  head: Option<Index>,
  // Least recently used.
  tail: Option<Index>,
}

impl<K: Eq + Hash + Clone, V> LruList<K, V> {
  pub fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::new(),
      head: None,
      tail: None,
    }
  }

  // Does not touch the arena or the lookup map.
  fn unlink(&mut self, index: Index) {
    let (prev, next) = {
      let node = &self.nodes[index];
      (node.prev, node.next)
    };

    match prev {
      Some(prev) => self.nodes[prev].next = next,
      None => self.head = next,
    }
    match next {
      Some(next) => self.nodes[next].prev = prev,
      None => self.tail = prev,
    }
  }

  fn link_front(&mut self, index: Index) {
    let old_head = self.head;
    self.nodes[index].next = old_head;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head {
      self.nodes[old_head].prev = Some(index);
    }
    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  pub fn len(&self) -> usize {
    self.lookup.len()
  }

  /// Looks up a value without changing its recency.
  pub fn peek<Q>(&self, key: &Q) -> Option<&V>
  where
    K: Borrow<Q>,
    Q: Eq + Hash + ?Sized,
  {
    let index = *self.lookup.get(key)?;
    self.nodes.get(index).map(|node| &node.value)
  }

  /// Looks up a value and marks it most recently used.
  pub fn touch<Q>(&mut self, key: &Q) -> Option<&V>
  where
    K: Borrow<Q>,
    Q: Eq + Hash + ?Sized,
  {
    let index = *self.lookup.get(key)?;
    if self.head != Some(index) {
      self.unlink(index);
      self.link_front(index);
    }
    self.nodes.get(index).map(|node| &node.value)
  }

  /// Inserts or replaces a value and marks it most recently used. Returns the
  /// replaced value.
  pub fn push_front(&mut self, key: K, value: V) -> Option<V> {
    if let Some(&index) = self.lookup.get(&key) {
      let old = std::mem::replace(&mut self.nodes[index].value, value);
      if self.head != Some(index) {
        self.unlink(index);
        self.link_front(index);
      }
      return Some(old);
    }

    let index = self.nodes.insert(Node {
      key: key.clone(),
      value,
      next: None,
      prev: None,
    });
    self.lookup.insert(key, index);
    self.link_front(index);
    None
  }

  pub fn pop_back(&mut self) -> Option<(K, V)> {
    let tail = self.tail?;
    self.unlink(tail);
    let node = self.nodes.remove(tail)?;
    self.lookup.remove(&node.key);
    Some((node.key, node.value))
  }

  pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Eq + Hash + ?Sized,
  {
    let index = self.lookup.remove(key)?;
    self.unlink(index);
    self.nodes.remove(index).map(|node| node.value)
  }

  pub fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
  }

  // Keys from most to least recently used.
  #[cfg(test)]
  pub(crate) fn keys_as_vec(&self) -> Vec<K> {
    let mut keys = Vec::new();
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.nodes[index].key.clone());
      current = self.nodes[index].next;
    }
    keys
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn new_list_is_empty() {
    let list = LruList::<i32, &str>::new();
    assert!(list.keys_as_vec().is_empty());
    assert_eq!(list.len(), 0);
    assert!(list.peek(&1).is_none());
  }

  #[test]
  fn push_front_orders_by_recency() {
    let mut list = LruList::new();
    assert_eq!(list.push_front(1, "a"), None);
    assert_eq!(list.push_front(2, "b"), None);
    assert_eq!(list.push_front(3, "c"), None);
    assert_eq!(list.keys_as_vec(), vec![3, 2, 1]);

    // Replacing the LRU item moves it to the front and returns the old value.
    assert_eq!(list.push_front(1, "z"), Some("a"));
    assert_eq!(list.keys_as_vec(), vec![1, 3, 2]);
    assert_eq!(list.peek(&1), Some(&"z"));
    assert_eq!(list.len(), 3);
  }

  #[test]
  fn touch_moves_to_front_but_peek_does_not() {
    let mut list = LruList::new();
    list.push_front(1, ());
    list.push_front(2, ());
    list.push_front(3, ());

    assert!(list.peek(&1).is_some());
    assert_eq!(list.keys_as_vec(), vec![3, 2, 1]);

    assert!(list.touch(&1).is_some());
    assert_eq!(list.keys_as_vec(), vec![1, 3, 2]);
    assert!(list.touch(&99).is_none());
  }

  #[test]
  fn pop_back_removes_least_recent() {
    let mut list = LruList::new();
    list.push_front("a", 1);
    list.push_front("b", 2);
    list.touch("a");

    assert_eq!(list.pop_back(), Some(("b", 2)));
    assert_eq!(list.pop_back(), Some(("a", 1)));
    assert_eq!(list.pop_back(), None);
    assert_eq!(list.len(), 0);
  }

  #[test]
  fn remove_from_middle_relinks_neighbours() {
    let mut list = LruList::new();
    list.push_front(1, 10);
    list.push_front(2, 20);
    list.push_front(3, 30);

    assert_eq!(list.remove(&2), Some(20));
    assert_eq!(list.remove(&2), None);
    assert_eq!(list.keys_as_vec(), vec![3, 1]);
    assert_eq!(list.pop_back(), Some((1, 10)));
    assert_eq!(list.keys_as_vec(), vec![3]);
  }

  #[test]
  fn borrowed_lookups_on_string_keys() {
    let mut list = LruList::new();
    list.push_front("user:1".to_string(), 1);
    assert_eq!(list.peek("user:1"), Some(&1));
    assert_eq!(list.remove("user:1"), Some(1));
  }

  #[test]
  fn clear_resets_list() {
    let mut list = LruList::new();
    list.push_front(1, 1);
    list.push_front(2, 2);
    list.clear();
    assert!(list.keys_as_vec().is_empty());
    assert_eq!(list.len(), 0);
    assert!(list.pop_back().is_none());
  }
}
