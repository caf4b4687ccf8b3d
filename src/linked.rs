//! Linked-LRU engine: a strict-LRU cache built on a concurrent map plus an
//! intrusive recency list, exposing a const-accessor handle that pins a
//! located value for the duration of the caller's inspection.
//!
//! The value storage (`DashMap`) supplies its own per-bucket concurrency;
//! the recency list is a separate key-indexed doubly-linked list guarded by
//! one dedicated [`parking_lot::Mutex`]. Values are stored behind `Arc`, so
//! [`Accessor`] holds a cloned reference rather than a map guard: this
//! pins the payload against reclamation (the node is only freed once its
//! last `Arc` drops) without holding any lock across the accessor's
//! lifetime — a concurrent `erase` of the same key can complete while the
//! accessor is still live, exactly as specified.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry as DashEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::sharded::Engine;

struct Links<K> {
    prev: Option<K>,
    next: Option<K>,
}

/// A doubly-linked list of keys, most-recently-used at the head. Values
/// live in the sibling `DashMap`; this list only tracks recency order.
struct Recency<K, S> {
    links: HashMap<K, Links<K>, S>,
    head: Option<K>,
    tail: Option<K>,
}

impl<K, S> Recency<K, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    fn with_hasher(hasher: S) -> Self {
        Self {
            links: HashMap::with_hasher(hasher),
            head: None,
            tail: None,
        }
    }

    fn push_front(&mut self, key: K) {
        match self.head.clone() {
            Some(old_head) => {
                if let Some(l) = self.links.get_mut(&old_head) {
                    l.prev = Some(key.clone());
                }
                self.links.insert(key.clone(), Links { prev: None, next: Some(old_head) });
                self.head = Some(key);
            }
            None => {
                self.links.insert(key.clone(), Links { prev: None, next: None });
                self.head = Some(key.clone());
                self.tail = Some(key);
            }
        }
    }

    /// Unlinks `key` from the list if present. No-op if already unlinked.
    fn unlink(&mut self, key: &K) -> Option<Links<K>> {
        let links = self.links.remove(key)?;
        match &links.prev {
            Some(p) => {
                if let Some(l) = self.links.get_mut(p) {
                    l.next = links.next.clone();
                }
            }
            None => self.head = links.next.clone(),
        }
        match &links.next {
            Some(n) => {
                if let Some(l) = self.links.get_mut(n) {
                    l.prev = links.prev.clone();
                }
            }
            None => self.tail = links.prev.clone(),
        }
        Some(links)
    }

    /// Moves `key` to the head. If the key was concurrently unlinked by an
    /// eviction, this is a no-op — the accessor still sees the payload, but
    /// the entry has left LRU ordering, per spec.
    fn move_to_front(&mut self, key: &K) {
        if self.unlink(key).is_some() {
            self.push_front(key.clone());
        }
    }

    fn pop_tail(&mut self) -> Option<K> {
        let tail = self.tail.clone()?;
        self.unlink(&tail);
        Some(tail)
    }

    fn clear(&mut self) {
        self.links.clear();
        self.head = None;
        self.tail = None;
    }
}

/// A scoped read lease over a located value, obtained from a successful
/// [`LinkedCache::find`]. There is no way to construct one without a hit —
/// the spec's "undefined dereference of an unchecked accessor" failure mode
/// collapses to "does not type-check" in this crate.
///
/// Holds an `Arc` clone of the payload rather than a lock guard: the value
/// remains readable even if a concurrent `erase` of the same key completes
/// while this accessor is still live.
pub struct Accessor<V> {
    value: Arc<V>,
}

impl<V> Accessor<V> {
    /// The pinned value.
    pub fn value(&self) -> &V {
        &self.value
    }
}

/// A single-shard strict-LRU cache of fixed capacity.
pub struct LinkedCache<K, V, S = RandomState> {
    map: DashMap<K, Arc<V>, S>,
    list: Mutex<Recency<K, S>>,
    len: AtomicUsize,
    capacity: NonZeroUsize,
}

impl<K, V> LinkedCache<K, V, RandomState>
where
    K: Hash + Eq + Clone,
{
    /// Allocates the associative container and recency list for `capacity`
    /// entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_hasher(capacity, RandomState::default())
    }
}

impl<K, V, S> LinkedCache<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    /// Allocates with a custom hash builder for both the value map and the
    /// recency list's key index.
    pub fn with_hasher(capacity: NonZeroUsize, hasher: S) -> Self {
        Self {
            map: DashMap::with_hasher(hasher.clone()),
            list: Mutex::new(Recency::with_hasher(hasher)),
            len: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Current number of live entries.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Soft upper bound on the number of live entries.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Locates `key`, binding an [`Accessor`] to it and promoting it to
    /// most-recently-used. Returns `None` on miss.
    pub fn find(&self, key: &K) -> Option<Accessor<V>> {
        let value = self.map.get(key)?.value().clone();
        {
            let mut list = self.list.lock();
            list.move_to_front(key);
        }
        trace!(component = "linked_cache", event = "find_hit", "cache hit, promoted to mru");
        Some(Accessor { value })
    }

    /// Inserts `key` if absent: publishes to the map, links at the head,
    /// and trims the tail if now over capacity. Returns `false` without
    /// modification if the key already existed.
    pub fn insert(&self, key: K, value: V) -> bool {
        match self.map.entry(key.clone()) {
            DashEntry::Occupied(_) => false,
            DashEntry::Vacant(slot) => {
                slot.insert(Arc::new(value));
                {
                    let mut list = self.list.lock();
                    list.push_front(key);
                }
                let new_len = self.len.fetch_add(1, Ordering::Relaxed) + 1;
                if new_len > self.capacity.get() {
                    self.evict_tail();
                }
                true
            }
        }
    }

    fn evict_tail(&self) {
        let victim = {
            let mut list = self.list.lock();
            list.pop_tail()
        };
        if let Some(key) = victim {
            if self.map.remove(&key).is_some() {
                self.len.fetch_sub(1, Ordering::Relaxed);
                trace!(component = "linked_cache", event = "evict_tail", "evicted lru tail");
            }
        }
    }

    /// Removes `key`. Returns the number of entries removed (`0` or `1`).
    pub fn erase(&self, key: &K) -> usize {
        if self.map.remove(key).is_some() {
            let mut list = self.list.lock();
            list.unlink(key);
            self.len.fetch_sub(1, Ordering::Relaxed);
            1
        } else {
            0
        }
    }

    /// Empties both the map and the recency list.
    pub fn clear(&self) {
        self.map.clear();
        let mut list = self.list.lock();
        list.clear();
        self.len.store(0, Ordering::Relaxed);
    }
}

impl<K, V, S> Engine for LinkedCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: BuildHasher + Default + Clone + Send + Sync + 'static,
{
    type Key = K;
    type Value = V;

    fn with_capacity(capacity: NonZeroUsize) -> Self {
        LinkedCache::with_hasher(capacity, S::default())
    }

    fn len(&self) -> usize {
        LinkedCache::len(self)
    }

    fn capacity(&self) -> usize {
        LinkedCache::capacity(self)
    }

    fn insert(&self, key: Self::Key, value: Self::Value) -> bool {
        LinkedCache::insert(self, key, value)
    }

    fn erase(&self, key: &Self::Key) -> usize {
        LinkedCache::erase(self, key)
    }

    fn clear(&self) {
        LinkedCache::clear(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn insert_then_find_roundtrips() {
        let cache: LinkedCache<u64, &'static str> = LinkedCache::new(cap(4));
        assert!(cache.insert(1, "one"));
        let acc = cache.find(&1).expect("present");
        assert_eq!(*acc.value(), "one");
    }

    #[test]
    fn insert_of_present_key_is_noop() {
        let cache: LinkedCache<u64, i32> = LinkedCache::new(cap(4));
        assert!(cache.insert(1, 10));
        assert!(!cache.insert(1, 20));
        assert_eq!(*cache.find(&1).unwrap().value(), 10);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn erase_removes_and_reports_count() {
        let cache: LinkedCache<u64, i32> = LinkedCache::new(cap(4));
        cache.insert(1, 10);
        assert_eq!(cache.erase(&1), 1);
        assert_eq!(cache.erase(&1), 0);
        assert!(cache.find(&1).is_none());
    }

    #[test]
    fn overflow_evicts_tail() {
        let cache: LinkedCache<u64, i32> = LinkedCache::new(cap(1));
        assert!(cache.insert(1, 10));
        assert!(cache.insert(2, 20));
        assert!(cache.find(&1).is_none());
        assert_eq!(*cache.find(&2).unwrap().value(), 20);
    }

    #[test]
    fn find_promotes_to_mru_and_protects_from_eviction() {
        let cache: LinkedCache<u64, i32> = LinkedCache::new(cap(2));
        cache.insert(1, 10);
        cache.insert(2, 20);
        // Touch 1 so it becomes MRU; 2 is now the tail.
        assert_eq!(*cache.find(&1).unwrap().value(), 10);
        cache.insert(3, 30);
        assert!(cache.find(&2).is_none());
        assert!(cache.find(&1).is_some());
        assert!(cache.find(&3).is_some());
    }

    #[test]
    fn accessor_survives_concurrent_erase() {
        let cache: LinkedCache<u64, i32> = LinkedCache::new(cap(4));
        cache.insert(1, 42);
        let acc = cache.find(&1).unwrap();
        assert_eq!(cache.erase(&1), 1);
        // The accessor holds its own Arc clone of the payload, so it keeps
        // observing it after the map entry is gone.
        assert_eq!(*acc.value(), 42);
        assert!(cache.find(&1).is_none());
    }

    #[test]
    fn len_never_exceeds_capacity_under_overflow() {
        let cache: LinkedCache<u64, u64> = LinkedCache::new(cap(10));
        for k in 0..25u64 {
            cache.insert(k, k);
        }
        assert_eq!(cache.len(), 10);
    }
}
