//! Process-wide caches shared across invocations.
//!
//! `TtlCache` is a plain keyed map with optional per-entry expiry. Concurrent writers to the
//! same key are tolerated (last writer wins). `CoalescingLoader` additionally guarantees a
//! single in-flight load per key; late joiners await the same shared future.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = lock(&self.entries);
        match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// `ttl = None` keeps the entry for the life of the process.
    pub fn insert(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        lock(&self.entries).insert(key, Entry { value, expires_at });
    }

    /// Mutates a live entry in place, keeping its expiry. Returns the updated value.
    pub fn update(&self, key: &K, f: impl FnOnce(&mut V)) -> Option<V> {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        let entry = entries.get_mut(key).filter(|e| e.is_live(now))?;
        f(&mut entry.value);
        Some(entry.value.clone())
    }

    pub async fn get_or_try_load<F, Fut>(&self, key: K, ttl: Option<Duration>, load: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = load().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    pub fn invalidate(&self, key: &K) {
        lock(&self.entries).remove(key);
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type SharedLoad<V> = Shared<BoxFuture<'static, std::result::Result<V, Arc<Error>>>>;

enum Slot<V> {
    Loading { generation: u64, load: SharedLoad<V> },
    Ready(V),
}

pub struct CoalescingLoader<K, V> {
    slots: Mutex<(u64, HashMap<K, Slot<V>>)>,
}

impl<K, V> Default for CoalescingLoader<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new((0, HashMap::new())),
        }
    }
}

impl<K, V> CoalescingLoader<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the loaded value without triggering a load.
    pub fn get(&self, key: &K) -> Option<V> {
        match lock(&self.slots).1.get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Loads `key` at most once at a time. Every caller that joined a failed load sees the
    /// same error, and the slot is cleared so the next call starts over.
    pub async fn get_or_load<F, Fut>(&self, key: K, load: F) -> std::result::Result<V, Arc<Error>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let (generation, pending) = {
            let mut guard = lock(&self.slots);
            let (counter, slots) = &mut *guard;
            match slots.get(&key) {
                Some(Slot::Ready(value)) => return Ok(value.clone()),
                Some(Slot::Loading { generation, load }) => {
                    debug!("Joining in-flight load");
                    (*generation, load.clone())
                }
                None => {
                    *counter += 1;
                    let generation = *counter;
                    let shared = load().map(|res| res.map_err(Arc::new)).boxed().shared();
                    slots.insert(
                        key.clone(),
                        Slot::Loading {
                            generation,
                            load: shared.clone(),
                        },
                    );
                    (generation, shared)
                }
            }
        };

        let outcome = pending.await;

        let mut guard = lock(&self.slots);
        let slots = &mut guard.1;
        let owns_slot = matches!(
            slots.get(&key),
            Some(Slot::Loading { generation: g, .. }) if *g == generation
        );
        if owns_slot {
            match &outcome {
                Ok(value) => {
                    slots.insert(key, Slot::Ready(value.clone()));
                }
                Err(_) => {
                    slots.remove(&key);
                }
            }
        }
        outcome
    }

    pub fn invalidate(&self, key: &K) {
        lock(&self.slots).1.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn ttl_entries_expire_and_permanent_ones_stay() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        cache.insert("short", 1, Some(Duration::from_secs(30)));
        cache.insert("forever", 2, None);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get(&"short"), Some(1));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&"short"), None);
        assert_eq!(cache.get(&"forever"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn update_keeps_expiry() {
        let cache: TtlCache<&str, u64> = TtlCache::new();
        cache.insert("count", 300, Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.update(&"count", |c| *c -= 3), Some(297));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.update(&"count", |c| *c -= 3), None);
    }

    #[tokio::test]
    async fn get_or_try_load_skips_loader_on_hit() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_try_load("token", None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        let res = cache
            .get_or_try_load("token", None, || async {
                Err(Error::PoolDirectory("boom".into()))
            })
            .await;
        assert!(res.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_load() {
        let loader: Arc<CoalescingLoader<&str, u32>> = Arc::new(CoalescingLoader::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let loader = Arc::clone(&loader);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    loader
                        .get_or_load("pools", move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(42)
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.get(&"pools"), Some(42));
    }

    #[tokio::test]
    async fn failure_clears_the_slot() {
        let loader: CoalescingLoader<&str, u32> = CoalescingLoader::new();
        let first = loader
            .get_or_load("pools", || async { Err(Error::PoolDirectory("down".into())) })
            .await;
        assert!(first.is_err());
        assert_eq!(loader.get(&"pools"), None);

        let second = loader.get_or_load("pools", || async { Ok(9) }).await;
        assert_eq!(second.unwrap(), 9);
    }

    #[tokio::test]
    async fn invalidated_entries_load_again() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        cache.insert("token", 1, None);
        cache.invalidate(&"token");
        assert_eq!(cache.get(&"token"), None);

        let reloaded = cache
            .get_or_try_load("token", None, || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(reloaded, 2);
    }

    #[tokio::test]
    async fn invalidated_slot_runs_the_loader_again() {
        let loader: CoalescingLoader<&str, u32> = CoalescingLoader::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let load = |value: u32| {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
        };

        assert_eq!(loader.get_or_load("pools", load(1)).await.unwrap(), 1);
        assert_eq!(loader.get_or_load("pools", load(5)).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        loader.invalidate(&"pools");
        assert_eq!(loader.get(&"pools"), None);
        assert_eq!(loader.get_or_load("pools", load(2)).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(loader.get(&"pools"), Some(2));
    }
}
