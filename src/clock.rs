//! Clock-LRU engine: a lock-protected, preallocated slot table that
//! approximates LRU with a single-bit reference marker and a two-hand clock
//! eviction scan.
//!
//! `find` takes a shared lock; `insert`/`erase`/`clear` take an exclusive
//! lock. The marker bits live outside the lock in their own atomic vector so
//! `find` can flip a bit while holding only a `RwLock::read` guard.

use std::collections::HashMap;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use crate::sharded::Engine;

struct Slot<K, V> {
    entry: Option<(K, V)>,
}

struct Inner<K, V, S> {
    slots: Vec<Slot<K, V>>,
    index: HashMap<K, usize, S>,
    cur_hand: usize,
    evict_hand: usize,
}

/// A single-shard Clock-LRU cache of fixed capacity `N`.
///
/// See the module docs for the concurrency contract. `insert` of an
/// already-present key is a no-op (returns `false`) and does *not* refresh
/// recency — callers that want refresh-on-reinsert must `find` first.
pub struct ClockCache<K, V, S = RandomState> {
    inner: RwLock<Inner<K, V, S>>,
    markers: Vec<AtomicU8>,
    capacity: NonZeroUsize,
}

impl<K, V> ClockCache<K, V, RandomState>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Allocates the slot table and index map for `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_hasher(capacity, RandomState::default())
    }
}

impl<K, V, S> ClockCache<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    /// Allocates the slot table and index map for `capacity` entries, using
    /// `hasher` to build the key index.
    pub fn with_hasher(capacity: NonZeroUsize, hasher: S) -> Self {
        let n = capacity.get();
        let mut slots = Vec::with_capacity(n);
        slots.resize_with(n, || Slot { entry: None });
        let mut markers = Vec::with_capacity(n);
        markers.resize_with(n, || AtomicU8::new(0));

        Self {
            inner: RwLock::new(Inner {
                slots,
                index: HashMap::with_capacity_and_hasher(n, hasher),
                cur_hand: 0,
                // cur_hand leads evict_hand by ceil(n/2) at construction:
                // evict_hand starts at floor(n/2) so (cur_hand - evict_hand)
                // mod n == ceil(n/2).
                evict_hand: n / 2,
            }),
            markers,
            capacity,
        }
    }

    /// Current number of live entries.
    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    /// `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slot count, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Returns a copy of the stored value if present, and sets that slot's
    /// recently-used marker. Takes a shared lock; does not touch the clock
    /// hands.
    pub fn find(&self, key: &K) -> Option<V> {
        let inner = self.inner.read();
        let idx = *inner.index.get(key)?;
        self.markers[idx].store(1, Ordering::Relaxed);
        trace!(component = "clock_cache", event = "find_hit", slot = idx, "cache hit");
        inner.slots[idx].entry.as_ref().map(|(_, v)| v.clone())
    }

    /// Inserts `key` if absent. Returns `true` on insertion, `false` if the
    /// key already existed — insertion of an existing key is a no-op and
    /// does not update the stored value.
    pub fn insert(&self, key: K, value: V) -> bool {
        // Advisory optimistic check under a shared lock, to avoid taking the
        // exclusive lock on the (likely) common case of a pre-existing key.
        {
            let inner = self.inner.read();
            if inner.index.contains_key(&key) {
                return false;
            }
        }

        let mut inner = self.inner.write();
        // Mandatory re-check: another writer may have inserted this key
        // between the shared-lock check above and acquiring this lock.
        if inner.index.contains_key(&key) {
            return false;
        }

        let n = self.capacity.get();
        let victim = loop {
            let cur = inner.cur_hand;
            if self.markers[cur].load(Ordering::Relaxed) > 0 {
                self.markers[cur].store(0, Ordering::Relaxed);
            }
            inner.cur_hand = (cur + 1) % n;

            let ev = inner.evict_hand;
            let evict_here = self.markers[ev].load(Ordering::Relaxed) == 0;
            inner.evict_hand = (ev + 1) % n;

            if evict_here {
                break ev;
            }
        };

        if let Some((old_key, _)) = inner.slots[victim].entry.take() {
            inner.index.remove(&old_key);
        }
        inner.slots[victim].entry = Some((key.clone(), value));
        self.markers[victim].store(0, Ordering::Relaxed);
        inner.index.insert(key, victim);

        trace!(component = "clock_cache", event = "insert_evict", slot = victim, "victim selected");
        true
    }

    /// Removes the mapping entry for `key`. Returns the number of entries
    /// removed (`0` or `1`). Does not reset the slot's marker.
    pub fn erase(&self, key: &K) -> usize {
        let mut inner = self.inner.write();
        if let Some(idx) = inner.index.remove(key) {
            inner.slots[idx].entry = None;
            1
        } else {
            0
        }
    }

    /// Empties the map. Slot storage is left intact — stale bytes may
    /// remain but are unreachable since the index no longer references
    /// them.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.index.clear();
    }
}

impl<K, V, S> Engine for ClockCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Default + Send + Sync + 'static,
{
    type Key = K;
    type Value = V;

    fn with_capacity(capacity: NonZeroUsize) -> Self {
        ClockCache::with_hasher(capacity, S::default())
    }

    fn len(&self) -> usize {
        ClockCache::len(self)
    }

    fn capacity(&self) -> usize {
        ClockCache::capacity(self)
    }

    fn insert(&self, key: Self::Key, value: Self::Value) -> bool {
        ClockCache::insert(self, key, value)
    }

    fn erase(&self, key: &Self::Key) -> usize {
        ClockCache::erase(self, key)
    }

    fn clear(&self) {
        ClockCache::clear(self)
    }
}
