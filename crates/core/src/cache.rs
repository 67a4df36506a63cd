//! Time-expiring in-process cache.
//!
//! [`TtlCache`] backs the permission cache, the session-token allow-list and
//! the request debouncer. Entries are checked for expiry on read, so a stale
//! entry is never returned even if the janitor has not run yet; the janitor
//! only reclaims memory.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Longest TTL honoured; longer ones are clamped so the deadline cannot overflow.
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn new(value: V, now: Instant, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: now + ttl.min(MAX_TTL),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// A concurrent map whose entries expire after a per-entry TTL.
///
/// Safe for unsynchronised use from any number of tasks. Writes become
/// visible to readers as soon as the write lock is released.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    default_ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the value for `key` if present and not expired.
    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    pub async fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).await.is_some()
    }

    /// Insert with the cache's default TTL, replacing any previous value.
    pub async fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl).await;
    }

    pub async fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let entry = Entry::new(value, Instant::now(), ttl);
        self.entries.write().await.insert(key, entry);
    }

    /// Insert only if no live entry exists for `key`.
    ///
    /// Returns `true` when the value was stored. The check and the write
    /// happen under one lock, so exactly one of several racing callers wins.
    pub async fn insert_if_absent(&self, key: K, value: V, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if entries.get(&key).is_some_and(|entry| entry.is_live(now)) {
            return false;
        }
        entries.insert(key, Entry::new(value, now, ttl));
        true
    }

    /// Remove `key`, returning its value if it was still live.
    pub async fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.entries
            .write()
            .await
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value)
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Spawn a background task that purges expired entries every `interval`
    /// until `cancel` fires.
    pub fn spawn_janitor(
        self: &Arc<Self>,
        name: &'static str,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(cache = name, "Cache janitor stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired().await;
                        if purged > 0 {
                            tracing::debug!(cache = name, purged, "Purged expired cache entries");
                        }
                    }
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn entry_is_visible_until_it_expires() {
        let cache: TtlCache<String, u32> = TtlCache::new(TTL);
        cache.insert("a".to_string(), 1).await;

        assert_eq!(cache.get("a").await, Some(1));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("a").await, Some(1));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("a").await, None, "expired entry must not be returned");
    }

    #[tokio::test(start_paused = true)]
    async fn custom_ttl_overrides_default() {
        let cache: TtlCache<u64, &'static str> = TtlCache::new(TTL);
        cache.insert_with_ttl(7, "short", Duration::from_secs(1)).await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cache.contains(&7u64).await);
    }

    #[tokio::test]
    async fn oversized_ttl_is_clamped() {
        let cache: TtlCache<u64, u64> = TtlCache::new(Duration::MAX);
        cache.insert(1, 10).await;
        cache.insert_with_ttl(2, 20, Duration::MAX).await;
        assert!(cache.insert_if_absent(3, 30, Duration::from_secs(u64::MAX)).await);

        assert_eq!(cache.get(&1u64).await, Some(10));
        assert_eq!(cache.get(&2u64).await, Some(20));
        assert_eq!(cache.get(&3u64).await, Some(30));
    }

    #[tokio::test]
    async fn remove_deletes_entry() {
        let cache: TtlCache<u64, u64> = TtlCache::new(TTL);
        cache.insert(1, 10).await;

        assert_eq!(cache.remove(&1u64).await, Some(10));
        assert_eq!(cache.get(&1u64).await, None);
        assert_eq!(cache.remove(&1u64).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn insert_if_absent_respects_live_entries_only() {
        let cache: TtlCache<&'static str, ()> = TtlCache::new(TTL);
        let window = Duration::from_millis(500);

        assert!(cache.insert_if_absent("k", (), window).await);
        assert!(!cache.insert_if_absent("k", (), window).await);

        tokio::time::advance(Duration::from_millis(501)).await;
        assert!(
            cache.insert_if_absent("k", (), window).await,
            "an expired entry must not block a new insert"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn purge_expired_reclaims_only_dead_entries() {
        let cache: TtlCache<u64, u64> = TtlCache::new(TTL);
        cache.insert_with_ttl(1, 1, Duration::from_secs(1)).await;
        cache.insert(2, 2).await;

        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&2u64).await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn janitor_stops_on_cancel() {
        let cache = Arc::new(TtlCache::<u64, u64>::new(TTL));
        cache.insert_with_ttl(1, 1, Duration::from_secs(1)).await;

        let cancel = CancellationToken::new();
        let handle = cache.spawn_janitor("test", Duration::from_secs(10), cancel.clone());

        tokio::time::advance(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;

        cancel.cancel();
        handle.await.expect("janitor task should exit cleanly");
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_writers_are_all_visible() {
        let cache = Arc::new(TtlCache::<u64, u64>::new(TTL));
        let mut handles = Vec::new();
        for i in 0..32u64 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.insert(i, i * 2).await }));
        }
        for handle in handles {
            handle.await.expect("writer task should not panic");
        }
        for i in 0..32u64 {
            assert_eq!(cache.get(&i).await, Some(i * 2));
        }
    }
}
