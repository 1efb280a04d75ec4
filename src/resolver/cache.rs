//! Content-addressed, single-flight resolved-module cache (spec §3
//! "Resolver config & cache entry", component C9). Grounded on
//! `just-bash::network::fetch`'s single in-flight-request-per-URL
//! pattern, generalized from URLs to arbitrary module references and
//! keyed by a blake3 fingerprint of the resolved content rather than the
//! reference string, so two references that resolve to byte-identical
//! content share a cache slot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OnceCell};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub content: String,
    pub fetched_at: Instant,
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.fetched_at.elapsed() > ttl,
            None => false,
        }
    }
}

pub fn fingerprint(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

type Slot = Arc<OnceCell<CacheEntry>>;

/// A cache keyed by resolver reference string, with single-flight
/// semantics: concurrent resolves of the same reference share one
/// in-flight fetch instead of issuing it twice.
#[derive(Clone, Default)]
pub struct ImmutableCache {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl ImmutableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `key`, fetching via `fetch` exactly
    /// once even under concurrent callers, and re-fetching if the
    /// existing entry has expired.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<CacheEntry, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<CacheEntry, E>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            if let Some(existing) = slots.get(key) {
                if let Some(entry) = existing.get() {
                    if !entry.is_expired() {
                        return Ok(entry.clone());
                    }
                    // expired: replace with a fresh slot so a new
                    // single-flight fetch can populate it.
                    let fresh: Slot = Arc::new(OnceCell::new());
                    slots.insert(key.to_string(), fresh.clone());
                    fresh
                } else {
                    existing.clone()
                }
            } else {
                let fresh: Slot = Arc::new(OnceCell::new());
                slots.insert(key.to_string(), fresh.clone());
                fresh
            }
        };

        slot.get_or_try_init(fetch).await.cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn concurrent_fetches_of_same_key_run_once() {
        let cache = ImmutableCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch::<_, _, std::convert::Infallible>("k", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(CacheEntry {
                            fingerprint: fingerprint("x"),
                            content: "x".into(),
                            fetched_at: Instant::now(),
                            ttl: None,
                        })
                    })
                    .await
                    .unwrap()
            }));
        }

        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fingerprint_is_stable_for_same_content() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
    }
}
