//! IP-address key type and its companion hash construction.
//!
//! [`IpHasher`] reproduces the original singleton's hash bit-for-bit on its
//! real deployment target: the seed is `mix64(family_tag)` (`0` for V4,
//! `1` for V6 — stand-ins for `AF_INET`/`AF_INET6`, since this crate
//! carries no socket dependency), then each subsequent 64-bit chunk of the
//! address (the V4 word zero-extended to 64 bits; the two 8-byte halves of
//! a V6 address, in order) is mixed with Thomas Wang's 64-bit integer
//! mixer and folded in with a Boost-style `hash_combine` using the
//! golden-ratio constant `0x9E3779B9`. Pairing [`IpAddr`] with any other
//! `BuildHasher` (e.g. the process default `RandomState`) still gives a
//! correct, well-distributed hash for in-process use — it just will not
//! match the original construction byte-for-byte. Use [`IpHasherBuilder`]
//! specifically when bit-exact interop with that construction matters.
//!
//! The original reads each address's bytes via a raw reinterpret cast of
//! `sin_addr`/`s6_addr` into a native machine word rather than an
//! explicit-endianness load, so the chunk values it feeds into the mixer
//! are native-endian. This crate's real targets are the little-endian
//! x86/ARM Linux hosts that ATS plugin actually runs on, so [`IpAddr::chunks`]
//! reads with `from_le_bytes` to match that reinterpret cast's bit pattern
//! on those hosts; see REDESIGN FLAGS in the crate-level spec for the
//! big-endian host caveat this implies.

use std::hash::{BuildHasher, Hash, Hasher};

use crate::linked::LinkedCache;
use crate::singleton::CacheRegistry;

/// An IPv4 or IPv6 address, stored as raw octets (no textual parsing or
/// formatting — this crate only uses it as an opaque, hashable key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpAddr {
    V4([u8; 4]),
    V6([u8; 16]),
}

impl IpAddr {
    /// The address's 64-bit chunks fed to the hash, in order: one chunk
    /// (the 32-bit address zero-extended) for V4, two 8-byte chunks for
    /// V6. Read native-endian (`from_le_bytes`, matching this crate's
    /// little-endian deployment targets) to reproduce the original's raw
    /// reinterpret-cast read of the address bytes; see the module docs.
    fn chunks(&self) -> ([u64; 2], usize) {
        match self {
            IpAddr::V4(b) => ([u32::from_le_bytes(*b) as u64, 0], 1),
            IpAddr::V6(b) => (
                [
                    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
                    u64::from_le_bytes([b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]]),
                ],
                2,
            ),
        }
    }

    /// Family discriminant folded into the hash first, so a V4 and a V6
    /// address sharing leading bytes never collide on that basis alone.
    /// `0` for V4, `1` for V6 (`AF_INET`/`AF_INET6` stand-ins).
    fn family_tag(&self) -> u64 {
        match self {
            IpAddr::V4(_) => 0,
            IpAddr::V6(_) => 1,
        }
    }
}

impl Hash for IpAddr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.family_tag());
        let (chunks, count) = self.chunks();
        for chunk in chunks.into_iter().take(count) {
            state.write_u64(chunk);
        }
    }
}

/// Thomas Wang's 64-bit integer hash mix, applied to each address word
/// before folding. Reproduced exactly, down to the shift amounts and
/// constants, for bit-for-bit interoperability with the original
/// construction.
const fn twang_mix64(mut key: u64) -> u64 {
    key = (!key).wrapping_add(key << 21);
    key ^= key >> 24;
    key = key.wrapping_add(key << 3).wrapping_add(key << 8);
    key ^= key >> 14;
    key = key.wrapping_add(key << 2).wrapping_add(key << 4);
    key ^= key >> 28;
    key = key.wrapping_add(key << 31);
    key
}

/// Boost's `hash_combine`: folds `value` into `seed` using the golden-ratio
/// derived constant `0x9E3779B9` plus a few bit-shifted terms of `seed`
/// itself, so order of combination matters.
const fn hash_combine(seed: u64, value: u64) -> u64 {
    seed ^ (value.wrapping_add(0x9E3779B9).wrapping_add(seed << 6).wrapping_add(seed >> 2))
}

/// A [`Hasher`] whose `write_u64` calls implement [`twang_mix64`] +
/// [`hash_combine`] directly, so [`IpAddr`]'s [`Hash`] impl (which only
/// ever calls `write_u64`) produces the exact original bit pattern.
///
/// Calling any other `write_*` method falls back to folding the raw bytes
/// in as a u64 a chunk at a time; [`IpAddr`] never does this, but the type
/// remains a well-behaved general-purpose `Hasher` for any other key that
/// happens to share this builder.
#[derive(Default)]
pub struct IpHasher {
    state: u64,
}

impl Hasher for IpHasher {
    fn write_u64(&mut self, word: u64) {
        self.state = hash_combine(self.state, twang_mix64(word));
    }

    fn write(&mut self, mut bytes: &[u8]) {
        while bytes.len() >= 8 {
            let (chunk, rest) = bytes.split_at(8);
            self.write_u64(u64::from_ne_bytes(chunk.try_into().unwrap()));
            bytes = rest;
        }
        if !bytes.is_empty() {
            let mut buf = [0u8; 8];
            buf[..bytes.len()].copy_from_slice(bytes);
            self.write_u64(u64::from_ne_bytes(buf));
        }
    }

    fn finish(&self) -> u64 {
        self.state
    }
}

/// Builds [`IpHasher`] instances. Pair with [`IpAddr`] wherever the exact
/// original hash construction must be reproduced.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpHasherBuilder;

impl BuildHasher for IpHasherBuilder {
    type Hasher = IpHasher;

    fn build_hasher(&self) -> IpHasher {
        IpHasher::default()
    }
}

/// The payload cached against an [`IpAddr`] lookup key: a previously
/// resolved decision that's cheap to reuse until it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLookup {
    /// Unix timestamp after which this lookup must be recomputed rather
    /// than trusted from cache.
    pub expiry_ts: i64,
    /// Upstream-assigned denial/allow code this lookup resolved to.
    pub denial_code: i32,
}

/// The process-wide cache of [`IpAddr`] to [`EntityLookup`], keyed and
/// sharded with [`IpHasherBuilder`] throughout so shard selection and
/// bucket placement both use the bit-exact original hash.
pub static IP_ENTITY_CACHE: CacheRegistry<
    LinkedCache<IpAddr, EntityLookup, IpHasherBuilder>,
    IpHasherBuilder,
> = CacheRegistry::new();
