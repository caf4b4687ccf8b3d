//! Process-wide singleton registry: first caller to `init` wins, every
//! later caller (including a later `init`) observes the same instance.

use std::hash::BuildHasher;
use std::collections::hash_map::RandomState;

use once_cell::sync::OnceCell;
use tracing::warn;

use crate::error::CacheError;
use crate::sharded::{Engine, ShardedCache};

/// Lazily-constructed process-wide home for a single [`ShardedCache`]
/// instance. Construct with [`CacheRegistry::new`] (a `const fn`, so this
/// can sit in a `static`), then call [`CacheRegistry::init`] once — from
/// wherever owns startup configuration — before any caller reaches for
/// [`CacheRegistry::get`].
pub struct CacheRegistry<E: Engine, BS = RandomState> {
    cell: OnceCell<ShardedCache<E, BS>>,
}

impl<E: Engine, BS: BuildHasher + Default> CacheRegistry<E, BS> {
    /// Creates an uninitialized registry. Does not allocate.
    pub const fn new() -> Self {
        Self { cell: OnceCell::new() }
    }

    /// Builds and installs the shared instance with `capacity` entries
    /// split across `shard_count` shards. Only the first call across the
    /// process actually constructs anything; later calls are no-ops that
    /// report whether they won the race.
    ///
    /// Returns `Ok(true)` if this call performed construction, `Ok(false)`
    /// if another call already had, or `Err` if `capacity`/`shard_count`
    /// fail validation (in which case the registry remains uninitialized
    /// and a later `init` call may still succeed).
    pub fn init(&self, capacity: usize, shard_count: usize) -> Result<bool, CacheError> {
        if self.cell.get().is_some() {
            return Ok(false);
        }
        let cache = ShardedCache::new(capacity, shard_count)?;
        Ok(self.cell.set(cache).is_ok())
    }

    /// Returns the shared instance, constructing it with an
    /// implementation-defined default (`capacity = 1024`, `shard_count =
    /// ` hardware parallelism) if no one has called [`CacheRegistry::init`]
    /// yet.
    pub fn get(&self) -> &ShardedCache<E, BS> {
        self.cell.get_or_init(|| {
            warn!(
                component = "cache_registry",
                event = "implicit_default_init",
                "registry read before init(); falling back to default capacity"
            );
            ShardedCache::with_default_shards(crate::DEFAULT_CAPACITY)
                .expect("default capacity and shard count are always valid")
        })
    }

    /// `true` once the instance has been constructed, by either `init` or
    /// `get`.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<E: Engine, BS: BuildHasher + Default> Default for CacheRegistry<E, BS> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockCache;

    #[test]
    fn first_init_wins_and_later_calls_see_same_instance() {
        let registry: CacheRegistry<ClockCache<u64, u64>> = CacheRegistry::new();
        assert!(registry.init(100, 4).unwrap());
        assert!(!registry.init(500, 8).unwrap());

        let cache = registry.get();
        assert_eq!(cache.capacity(), 100);
        assert!(cache.insert(1, 10));

        // A second handle into the same registry sees the first insert.
        assert_eq!(registry.get().find(&1), Some(10));
    }

    #[test]
    fn get_without_init_falls_back_to_default() {
        let registry: CacheRegistry<ClockCache<u64, u64>> = CacheRegistry::new();
        assert!(!registry.is_initialized());
        let cache = registry.get();
        assert_eq!(cache.capacity(), crate::DEFAULT_CAPACITY);
        assert!(registry.is_initialized());
    }

    #[test]
    fn init_with_bad_params_leaves_registry_open_for_retry() {
        let registry: CacheRegistry<ClockCache<u64, u64>> = CacheRegistry::new();
        assert!(registry.init(0, 4).is_err());
        assert!(!registry.is_initialized());
        assert!(registry.init(100, 4).unwrap());
    }
}
