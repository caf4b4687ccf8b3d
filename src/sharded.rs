//! Scalable sharded wrapper: stripes `S` independent engine instances by
//! the upper bits of the key hash to reduce contention.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::num::NonZeroUsize;

use tracing::debug;

use crate::clock::ClockCache;
use crate::error::CacheError;
use crate::linked::{Accessor, LinkedCache};

/// The operations a shard engine (the [`crate::clock::ClockCache`] or
/// [`crate::linked::LinkedCache`]) must provide so [`ShardedCache`] can
/// manage a homogeneous fleet of them. `find` is intentionally not part of
/// this trait: its return type differs per engine (a value copy for the
/// clock engine, an [`crate::linked::Accessor`] for the linked engine), so
/// each is exposed through its own inherent `impl ShardedCache<...>` block
/// instead.
pub trait Engine: Send + Sync {
    /// The opaque key type.
    type Key: Hash + Eq + Clone;
    /// The opaque value type.
    type Value;

    /// Allocates a single shard of fixed `capacity`.
    fn with_capacity(capacity: NonZeroUsize) -> Self;
    /// Current number of live entries in this shard.
    fn len(&self) -> usize;
    /// This shard's fixed capacity.
    fn capacity(&self) -> usize;
    /// Inserts if absent; `true` on insertion, `false` on duplicate.
    fn insert(&self, key: Self::Key, value: Self::Value) -> bool;
    /// Removes the entry for `key`; returns the count removed (`0` or `1`).
    fn erase(&self, key: &Self::Key) -> usize;
    /// Empties this shard.
    fn clear(&self);
}

/// How a [`ShardedCache`] maps a key's hash to a shard index.
///
/// The default, [`ShardSelector::HighBits`], reproduces the original
/// design's selector: shift the hash right by `(word_bits - 16)` before
/// reducing modulo the shard count, because the companion IP-address hash
/// (see [`crate::ipaddr`]) has better randomness in its high bits. A hash
/// with uniformly random low bits (most general-purpose hashers, including
/// the default `RandomState`) works equally well under
/// [`ShardSelector::LowBits`], which is cheaper (no shift) and is what this
/// crate's teacher's own sharded map uses internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardSelector {
    /// `(hash >> (64 - 16)) % shard_count`.
    HighBits,
    /// `hash % shard_count`.
    LowBits,
}

impl Default for ShardSelector {
    fn default() -> Self {
        ShardSelector::HighBits
    }
}

fn shard_index(hash: u64, selector: ShardSelector, shard_count: usize) -> usize {
    match selector {
        ShardSelector::HighBits => ((hash >> (u64::BITS - 16)) as usize) % shard_count,
        ShardSelector::LowBits => (hash as usize) % shard_count,
    }
}

/// Splits `capacity` across `shard_count` shards: shard 0 gets the floor
/// plus the remainder, every other shard gets the floor.
fn partition_capacity(capacity: usize, shard_count: usize) -> Vec<usize> {
    let base = capacity / shard_count;
    let remainder = capacity % shard_count;
    (0..shard_count)
        .map(|i| if i == 0 { base + remainder } else { base })
        .collect()
}

/// A fixed-length vector of independent engine instances, striped by key
/// hash. `len`/`clear` touch every shard and are not atomic across shards —
/// see the crate-level concurrency notes.
pub struct ShardedCache<E: Engine, BS = RandomState> {
    shards: Box<[E]>,
    selector: ShardSelector,
    hash_builder: BS,
}

impl<E: Engine, BS: BuildHasher + Default> ShardedCache<E, BS> {
    /// Creates a sharded cache of `shard_count` shards totalling `capacity`
    /// entries, using the default [`ShardSelector::HighBits`] selector and
    /// a default-constructed hash builder.
    ///
    /// Fails if `capacity` or `shard_count` is zero, or if `shard_count`
    /// exceeds `capacity` (which would leave some shard with zero
    /// capacity).
    pub fn new(capacity: usize, shard_count: usize) -> Result<Self, CacheError> {
        Self::with_selector(capacity, shard_count, ShardSelector::default())
    }

    /// As [`ShardedCache::new`], with an explicit [`ShardSelector`].
    pub fn with_selector(
        capacity: usize,
        shard_count: usize,
        selector: ShardSelector,
    ) -> Result<Self, CacheError> {
        Self::with_hasher(capacity, shard_count, selector, BS::default())
    }

    /// Creates a sharded cache whose shard count defaults to hardware
    /// parallelism (capped at `capacity`, so no shard is ever starved).
    pub fn with_default_shards(capacity: usize) -> Result<Self, CacheError> {
        let shard_count = std::cmp::min(crate::default_shard_count(), capacity.max(1));
        Self::new(capacity, shard_count)
    }
}

impl<E: Engine, BS: BuildHasher> ShardedCache<E, BS> {
    /// As [`ShardedCache::with_selector`], with an explicit hash builder
    /// used for shard selection.
    pub fn with_hasher(
        capacity: usize,
        shard_count: usize,
        selector: ShardSelector,
        hash_builder: BS,
    ) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        if shard_count == 0 {
            return Err(CacheError::ZeroShardCount);
        }
        if shard_count > capacity {
            return Err(CacheError::TooManyShards { shard_count, capacity });
        }

        let shards: Vec<E> = partition_capacity(capacity, shard_count)
            .into_iter()
            .map(|cap| {
                E::with_capacity(NonZeroUsize::new(cap).expect("shard_count <= capacity guarantees cap > 0"))
            })
            .collect();

        debug!(
            component = "sharded_cache",
            event = "constructed",
            capacity,
            shard_count,
            "sharded cache constructed"
        );

        Ok(Self { shards: shards.into_boxed_slice(), selector, hash_builder })
    }

    fn hash_of(&self, key: &E::Key) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_index_for(&self, key: &E::Key) -> usize {
        shard_index(self.hash_of(key), self.selector, self.shards.len())
    }

    /// The shard instance that owns `key`.
    pub fn shard_for(&self, key: &E::Key) -> &E {
        &self.shards[self.shard_index_for(key)]
    }

    /// Total entries across all shards. A non-atomic snapshot: an
    /// approximation under concurrent mutation, not a transactional count.
    pub fn len(&self) -> usize {
        self.shards.iter().map(Engine::len).sum()
    }

    /// `true` if every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total capacity across all shards.
    pub fn capacity(&self) -> usize {
        self.shards.iter().map(Engine::capacity).sum()
    }

    /// Entry count of a single shard, or `0` if `shard_index` is out of
    /// range.
    pub fn len_of(&self, shard_index: usize) -> usize {
        self.shards.get(shard_index).map(Engine::len).unwrap_or(0)
    }

    /// Capacity of a single shard, or `0` if `shard_index` is out of range.
    pub fn capacity_of(&self, shard_index: usize) -> usize {
        self.shards.get(shard_index).map(Engine::capacity).unwrap_or(0)
    }

    /// Inserts into the shard selected by `key`'s hash.
    pub fn insert(&self, key: E::Key, value: E::Value) -> bool {
        self.shard_for(&key).insert(key, value)
    }

    /// Removes `key` from the shard selected by its hash.
    pub fn erase(&self, key: &E::Key) -> usize {
        self.shard_for(key).erase(key)
    }

    /// Clears every shard, in index order. Not atomic across shards.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.clear();
        }
    }
}

impl<K, V, S, BS> ShardedCache<ClockCache<K, V, S>, BS>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Default + Send + Sync + 'static,
    BS: BuildHasher,
{
    /// Locates `key` in the shard selected by its hash; see
    /// [`ClockCache::find`].
    pub fn find(&self, key: &K) -> Option<V> {
        self.shard_for(key).find(key)
    }
}

impl<K, V, S, BS> ShardedCache<LinkedCache<K, V, S>, BS>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: BuildHasher + Default + Clone + Send + Sync + 'static,
    BS: BuildHasher,
{
    /// Locates `key` in the shard selected by its hash; see
    /// [`LinkedCache::find`].
    pub fn find(&self, key: &K) -> Option<Accessor<V>> {
        self.shard_for(key).find(key)
    }
}
