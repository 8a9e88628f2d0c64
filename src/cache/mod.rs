//! Keyed query cache with expiry and single-flight loading.
//!
//! A key is either being loaded (every caller awaits the same shared future)
//! or holds a value stamped with the instant it arrived. Values older than the
//! TTL are reloaded on the next request. Failed loads are handed to every
//! waiter and then forgotten.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

type SharedLoad<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

enum Slot<V, E> {
    Loading { generation: u64, load: SharedLoad<V, E> },
    Ready { value: V, stored_at: Instant },
}

struct Entries<K, V, E> {
    slots: HashMap<K, Slot<V, E>>,
    next_generation: u64,
}

pub struct QueryCache<K, V, E> {
    ttl: Duration,
    entries: Mutex<Entries<K, V, E>>,
}

/// How a lookup was served, for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    Hit,
    Joined,
    Loaded,
}

impl<K, V, E> QueryCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(Entries {
                slots: HashMap::new(),
                next_generation: 0,
            }),
        }
    }

    /// Returns the cached value for `key`, joins an in-flight load for it, or
    /// starts one with `load`.
    pub async fn get_or_load<F, Fut>(&self, key: &K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.get_or_load_traced(key, load).await.0
    }

    pub async fn get_or_load_traced<F, Fut>(&self, key: &K, load: F) -> (Result<V, E>, Lookup)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (generation, shared, lookup) = {
            let mut entries = self.entries.lock().await;
            let in_flight = match entries.slots.get(key) {
                Some(Slot::Ready { value, stored_at }) if stored_at.elapsed() < self.ttl => {
                    return (Ok(value.clone()), Lookup::Hit);
                }
                Some(Slot::Loading { generation, load }) => Some((*generation, load.clone())),
                _ => None,
            };
            match in_flight {
                Some((generation, shared)) => (generation, shared, Lookup::Joined),
                None => {
                    let generation = entries.next_generation;
                    entries.next_generation += 1;
                    let shared = load().boxed().shared();
                    entries.slots.insert(
                        key.clone(),
                        Slot::Loading {
                            generation,
                            load: shared.clone(),
                        },
                    );
                    (generation, shared, Lookup::Loaded)
                }
            }
        };

        let result = shared.await;
        self.settle(key, generation, &result).await;
        (result, lookup)
    }

    // Any waiter may settle the slot; only the first one for this generation does anything.
    async fn settle(&self, key: &K, generation: u64, result: &Result<V, E>) {
        let mut entries = self.entries.lock().await;
        let still_loading = matches!(
            entries.slots.get(key),
            Some(Slot::Loading { generation: g, .. }) if *g == generation
        );
        if !still_loading {
            return;
        }
        match result {
            Ok(value) => {
                entries.slots.insert(
                    key.clone(),
                    Slot::Ready {
                        value: value.clone(),
                        stored_at: Instant::now(),
                    },
                );
            }
            Err(_) => {
                entries.slots.remove(key);
            }
        }
    }

    /// Fresh cached value, without loading.
    pub async fn peek(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().await;
        match entries.slots.get(key) {
            Some(Slot::Ready { value, stored_at }) if stored_at.elapsed() < self.ttl => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    /// Drops every entry. Loads already in flight still complete for their
    /// waiters but are not stored.
    pub async fn invalidate_all(&self) {
        self.entries.lock().await.slots.clear();
    }

    /// Number of slots, loading or ready, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V, E> Default for QueryCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counting_load(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, String>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_identical_keys_share_one_load() {
        let cache: QueryCache<&str, u32, String> = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_load_traced(&"k", counting_load(&calls, 1)),
            cache.get_or_load_traced(&"k", counting_load(&calls, 2)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.0, Ok(1));
        assert_eq!(b.0, Ok(1));
        assert_eq!(a.1, Lookup::Loaded);
        assert_eq!(b.1, Lookup::Joined);
    }

    #[tokio::test(start_paused = true)]
    async fn values_expire_after_the_ttl() {
        let cache: QueryCache<&str, u32, String> = QueryCache::new(Duration::from_secs(5));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_load(&"k", counting_load(&calls, 1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        let (value, lookup) = cache.get_or_load_traced(&"k", counting_load(&calls, 2)).await;
        assert_eq!((value, lookup), (Ok(1), Lookup::Hit));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(4)).await;
        let value = cache.get_or_load(&"k", counting_load(&calls, 3)).await;
        assert_eq!(value, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_reach_every_waiter_and_are_not_kept() {
        let cache: QueryCache<&str, u32, String> = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = |calls: &Arc<AtomicUsize>| {
            let calls = Arc::clone(calls);
            move || {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Err::<u32, String>("boom".to_string())
                }
                .boxed()
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_load(&"k", failing(&calls)),
            cache.get_or_load(&"k", failing(&calls)),
        );
        assert_eq!(a, Err("boom".to_string()));
        assert_eq!(b, Err("boom".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty().await);

        let retry = cache.get_or_load(&"k", counting_load(&calls, 9)).await;
        assert_eq!(retry, Ok(9));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidating_an_in_flight_load_keeps_its_result_out() {
        let cache: Arc<QueryCache<&'static str, u32, String>> = Arc::new(QueryCache::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let pending = {
            let cache = Arc::clone(&cache);
            let load = counting_load(&calls, 1);
            tokio::spawn(async move { cache.get_or_load(&"k", load).await })
        };
        tokio::task::yield_now().await;
        cache.invalidate_all().await;

        assert_eq!(pending.await.unwrap(), Ok(1));
        assert!(cache.peek(&"k").await.is_none());

        let fresh = cache.get_or_load(&"k", counting_load(&calls, 2)).await;
        assert_eq!(fresh, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
