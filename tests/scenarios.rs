//! End-to-end scenarios against the public API, one per numbered case.

use std::net::Ipv4Addr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use cache_core::clock::ClockCache;
use cache_core::config::CacheConfig;
use cache_core::ipaddr::{EntityLookup, IpAddr};
use cache_core::linked::LinkedCache;
use cache_core::sharded::ShardedCache;
use cache_core::singleton::CacheRegistry;

fn ipv4_key(a: u8, b: u8, c: u8, d: u8) -> u64 {
    u32::from(Ipv4Addr::new(a, b, c, d)) as u64
}

/// Scenario 1: a single-threaded clock-cache loaded with a contiguous
/// range of IPv4-derived keys never exceeds its configured capacity and
/// still answers hits for the retained fraction.
#[test]
fn scenario_clock_smoke_test_over_ip_range() {
    let cache: ClockCache<u64, u32> = ClockCache::new(NonZeroUsize::new(64).unwrap());
    for i in 0..200u8 {
        let key = ipv4_key(10, 0, 0, i);
        cache.insert(key, i as u32);
    }
    assert_eq!(cache.len(), 64);
    // The most recently inserted keys must still be present.
    for i in 195..200u8 {
        let key = ipv4_key(10, 0, 0, i);
        assert_eq!(cache.find(&key), Some(i as u32));
    }
}

/// Scenario 2: at capacity 1, every insert evicts the sole incumbent.
#[test]
fn scenario_capacity_one_evicts_incumbent() {
    let cache: LinkedCache<u64, &'static str> = LinkedCache::new(NonZeroUsize::new(1).unwrap());
    assert!(cache.insert(1, "first"));
    assert!(cache.insert(2, "second"));
    assert!(cache.find(&1).is_none());
    assert_eq!(*cache.find(&2).unwrap().value(), "second");
}

/// Scenario 3: a recently-touched entry survives a sweep that would
/// otherwise have claimed it, in both engines.
#[test]
fn scenario_second_chance_survival_both_engines() {
    let clock: ClockCache<u64, u64> = ClockCache::new(NonZeroUsize::new(4).unwrap());
    for k in 1..=4u64 {
        clock.insert(k, k);
    }
    assert_eq!(clock.find(&1), Some(1));
    clock.insert(5, 5);
    assert_eq!(clock.find(&1), Some(1));

    let linked: LinkedCache<u64, u64> = LinkedCache::new(NonZeroUsize::new(2).unwrap());
    linked.insert(1, 1);
    linked.insert(2, 2);
    assert_eq!(*linked.find(&1).unwrap().value(), 1);
    linked.insert(3, 3);
    assert!(linked.find(&2).is_none());
    assert!(linked.find(&1).is_some());
}

/// Scenario 4: capacity partitions across shards with the remainder
/// landing on shard 0, for both an evenly-divisible and a remainder case.
#[test]
fn scenario_sharded_partitioning() {
    let even: ShardedCache<ClockCache<u64, u64>> = ShardedCache::new(100, 4).unwrap();
    for i in 0..4 {
        assert_eq!(even.capacity_of(i), 25);
    }

    let remainder: ShardedCache<ClockCache<u64, u64>> = ShardedCache::new(103, 4).unwrap();
    assert_eq!(remainder.capacity_of(0), 28);
    for i in 1..4 {
        assert_eq!(remainder.capacity_of(i), 25);
    }
    assert_eq!(remainder.capacity(), 103);
}

/// Scenario 5: two independent handles into the same registry observe the
/// same underlying instance — simulating two call sites ("modules") that
/// never coordinate directly.
#[test]
fn scenario_singleton_identity_across_call_sites() {
    static REGISTRY: CacheRegistry<ClockCache<u64, u64>> = CacheRegistry::new();

    fn module_a_writes() {
        REGISTRY.init(50, 2).unwrap();
        assert!(REGISTRY.get().insert(7, 70));
    }

    fn module_b_reads() -> Option<u64> {
        REGISTRY.init(50, 2).unwrap(); // loses the race, observes module_a's instance
        REGISTRY.get().find(&7)
    }

    module_a_writes();
    assert_eq!(module_b_reads(), Some(70));
}

/// Scenario 6: many threads hammering insert/find/erase on overlapping
/// keys never panics, never loses the invariant that `len()` stays within
/// `[0, capacity]`, and the engine remains usable afterward.
#[test]
fn scenario_concurrent_same_key_traffic() {
    let cache: Arc<ShardedCache<LinkedCache<u64, u64>>> =
        Arc::new(ShardedCache::new(64, 8).unwrap());

    let handles: Vec<_> = (0..16)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..500u64 {
                    let key = (i % 32) as u64;
                    match t % 3 {
                        0 => {
                            cache.insert(key, key * 10);
                        }
                        1 => {
                            cache.find(&key);
                        }
                        _ => {
                            cache.erase(&key);
                        }
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert!(cache.len() <= cache.capacity());
}

/// The config builder produces a usable cache from declarative settings,
/// including the YAML path a caller would exercise in production.
#[test]
fn config_builds_a_working_cache_from_yaml() {
    let cfg: CacheConfig = serde_yaml::from_str("capacity: 128\nshard_count: 4\n").unwrap();
    let cache: ShardedCache<ClockCache<u64, u64>> = cfg.build().unwrap();
    assert!(cache.insert(42, 420));
    assert_eq!(cache.find(&42), Some(420));
}

/// The IP-address key type round-trips through a sharded linked cache the
/// way the companion singleton is meant to be used.
#[test]
fn ip_entity_lookup_roundtrips() {
    let cache: ShardedCache<LinkedCache<IpAddr, EntityLookup, cache_core::ipaddr::IpHasherBuilder>, cache_core::ipaddr::IpHasherBuilder> =
        ShardedCache::with_hasher(256, 8, Default::default(), Default::default()).unwrap();
    let addr = IpAddr::V4([198, 51, 100, 23]);
    let lookup = EntityLookup { expiry_ts: 1_900_000_000, denial_code: 1 };
    assert!(cache.insert(addr, lookup));
    assert_eq!(*cache.find(&addr).unwrap().value(), lookup);
}
