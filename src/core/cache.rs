use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheValue<V> {
    value: V,
    stored_at: Instant,
}

/// In-memory cache that remembers when each entry was stored. Entries are
/// never evicted, only overwritten; callers decide what counts as fresh.
#[derive(Clone)]
pub struct TimedCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, CacheValue<V>>>>,
}

impl<K, V> TimedCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the entry only if it was stored less than `max_age` ago.
    pub async fn get_fresh(&self, key: &K, max_age: Duration) -> Option<V> {
        let cache = self.inner.lock().await;
        match cache.get(key) {
            Some(entry) if entry.stored_at.elapsed() < max_age => {
                debug!("Cache HIT for key: {:?}", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache entry stale for key: {:?}", key);
                None
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    /// Returns the entry regardless of its age.
    pub async fn get_any(&self, key: &K) -> Option<V> {
        let cache = self.inner.lock().await;
        cache.get(key).map(|entry| entry.value.clone())
    }

    pub async fn put(&self, key: K, value: V) {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(
            key,
            CacheValue {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

impl<K, V> Default for TimedCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
