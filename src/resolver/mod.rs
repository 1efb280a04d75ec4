//! Module resolver framework (spec §4.9, component C9): pluggable
//! resolvers, prefix-bound dispatch, content-addressed caching, and
//! the lock file format that pins resolved fingerprints.

pub mod cache;
pub mod lockfile;
pub mod manager;
pub mod resolvers;

pub use cache::{fingerprint, CacheEntry, ImmutableCache};
pub use lockfile::{LockEntry, LockFile};
pub use manager::{ResolvedModule, Resolver, ResolverManager, MAX_IMPORT_DEPTH};
