//! High-throughput, concurrent, bounded in-memory associative cache.
//!
//! Two interchangeable eviction engines, both exposed behind a common
//! [`sharded`] wrapper for horizontal scaling across lock domains:
//!
//! - [`clock`] — Clock-LRU: a fixed slot table with a single reference bit
//!   per slot and a two-hand clock sweep. Cheap, approximate recency.
//! - [`linked`] — Linked-LRU: a concurrent map paired with an intrusive
//!   recency list. Strict recency order, at the cost of a list-mutex
//!   critical section on every access.
//!
//! [`singleton`] provides a process-wide, first-caller-wins registry for
//! either engine; [`config`] lets callers source capacity/shard settings
//! declaratively; [`ipaddr`] is a ready-made IP-address key type with a
//! hash construction that reproduces a known external format bit-for-bit.
//!
//! Every fallible entry point in this crate returns [`error::CacheError`]
//! only for construction-time misuse (zero capacity, zero shards, more
//! shards than capacity). All steady-state outcomes — miss, hit, duplicate
//! insert, absent erase — are ordinary return values, never errors.

pub mod clock;
pub mod config;
pub mod error;
pub mod ipaddr;
pub mod linked;
pub mod sharded;
pub mod singleton;

/// Capacity used by [`singleton::CacheRegistry::get`] when no caller has
/// called `init` yet.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default shard count for a sharded cache whose caller has no opinion:
/// the host's available parallelism, floored at 1.
pub fn default_shard_count() -> usize {
    num_cpus::get().max(1)
}
