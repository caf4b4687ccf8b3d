//! Declarative construction of a [`ShardedCache`]: gather capacity/shard
//! settings (e.g. parsed from YAML by a caller, in the teacher's style),
//! validate them once, then build.

use std::hash::BuildHasher;
use std::collections::hash_map::RandomState;

use serde::Deserialize;

use crate::error::CacheError;
use crate::sharded::{Engine, ShardSelector, ShardedCache};

/// Settings for a [`ShardedCache`], deserializable so a caller can source
/// them from a config file the way the rest of an application does.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Total entries across all shards.
    pub capacity: usize,
    /// Number of shards. Defaults to hardware parallelism when omitted.
    #[serde(default = "default_shard_count_setting")]
    pub shard_count: usize,
    /// Shard-selection strategy. Defaults to [`ShardSelector::HighBits`].
    #[serde(default)]
    pub selector: ShardSelector,
}

fn default_shard_count_setting() -> usize {
    crate::default_shard_count()
}

impl CacheConfig {
    /// A config with the given capacity and every other field at its
    /// default.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, shard_count: default_shard_count_setting(), selector: ShardSelector::default() }
    }

    /// Checks `capacity`/`shard_count` without constructing anything.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        if self.shard_count == 0 {
            return Err(CacheError::ZeroShardCount);
        }
        if self.shard_count > self.capacity {
            return Err(CacheError::TooManyShards {
                shard_count: self.shard_count,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Validates and builds a [`ShardedCache`] with a default-constructed
    /// hash builder.
    pub fn build<E: Engine>(&self) -> Result<ShardedCache<E, RandomState>, CacheError> {
        self.validate()?;
        ShardedCache::with_selector(self.capacity, self.shard_count, self.selector)
    }

    /// As [`CacheConfig::build`], with an explicit hash builder.
    pub fn build_with_hasher<E: Engine, BS: BuildHasher>(
        &self,
        hasher: BS,
    ) -> Result<ShardedCache<E, BS>, CacheError> {
        self.validate()?;
        ShardedCache::with_hasher(self.capacity, self.shard_count, self.selector, hasher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockCache;

    #[test]
    fn default_shard_count_is_at_least_one() {
        let cfg = CacheConfig::new(100);
        assert!(cfg.shard_count >= 1);
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let cfg = CacheConfig::new(0);
        assert!(matches!(cfg.validate(), Err(CacheError::ZeroCapacity)));
    }

    #[test]
    fn build_constructs_a_working_cache() {
        let mut cfg = CacheConfig::new(100);
        cfg.shard_count = 4;
        let cache: ShardedCache<ClockCache<u64, u64>> = cfg.build().unwrap();
        assert!(cache.insert(1, 10));
        assert_eq!(cache.find(&1), Some(10));
    }

    #[test]
    fn deserializes_from_minimal_yaml() {
        let cfg: CacheConfig = serde_yaml::from_str("capacity: 256\n").unwrap();
        assert_eq!(cfg.capacity, 256);
        assert!(cfg.shard_count >= 1);
    }
}
