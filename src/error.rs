//! Errors surfaced at cache construction time.
//!
//! Every other failure mode in this crate — absent key, duplicate key on
//! insert — is signaled through an ordinary return value, never through
//! `CacheError`; see the crate-level docs.

/// Construction-time misuse. The only error this crate ever returns.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// `capacity` was zero.
    #[error("cache capacity must be at least 1")]
    ZeroCapacity,

    /// `shard_count` was zero.
    #[error("shard_count must be at least 1")]
    ZeroShardCount,

    /// `shard_count` exceeded `capacity`, which would leave some shard with
    /// zero capacity.
    #[error("shard_count ({shard_count}) must not exceed capacity ({capacity})")]
    TooManyShards { shard_count: usize, capacity: usize },
}
