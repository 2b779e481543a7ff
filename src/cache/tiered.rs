//! The tiered cache: L1 LRU, optional write-behind/read-through L2, hook
//! chain, and statistics composed behind a single coherent API.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;

use super::element::Element;
use super::error::CacheError;
use super::hook::{HookChain, HookHandler};
use super::l2::RemoteStore;
use super::lru::LruCache;
use super::serializer::{JsonSerializer, Serializer};
use super::stats::{Stats, StatsSnapshot};

/// Beyond this in-memory access latency, `Get` logs a warning.
const OPTIMAL_IN_MEM_ACCESS_TIME: Duration = Duration::from_millis(1);

const DEFAULT_NAMESPACE: &str = "one_cache";
const DEFAULT_MAX_ITEMS: usize = 100_000;
const DEFAULT_EXPIRATION: Duration = Duration::from_secs(30);

/// Write-behind envelope.
#[derive(Debug, Clone)]
struct CacheItem {
    key: String,
    value: Vec<u8>,
    ttl: Duration,
    action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Upsert,
    Delete,
}

/// Builder for [`TieredCache`]. Repeated application of a setter is
/// last-wins.
pub struct TieredCacheBuilder<S: Serializer = JsonSerializer> {
    namespace: String,
    max_items: usize,
    default_expiration: Duration,
    remote: Option<Arc<dyn RemoteStore>>,
    serializer: S,
}

impl Default for TieredCacheBuilder<JsonSerializer> {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_items: DEFAULT_MAX_ITEMS,
            default_expiration: DEFAULT_EXPIRATION,
            remote: None,
            serializer: JsonSerializer,
        }
    }
}

impl TieredCacheBuilder<JsonSerializer> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Serializer> TieredCacheBuilder<S> {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn default_expiration(mut self, default_expiration: Duration) -> Self {
        self.default_expiration = default_expiration;
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn serializer<S2: Serializer>(self, serializer: S2) -> TieredCacheBuilder<S2> {
        TieredCacheBuilder {
            namespace: self.namespace,
            max_items: self.max_items,
            default_expiration: self.default_expiration,
            remote: self.remote,
            serializer,
        }
    }

    /// Builds the cache. Spawns the write-behind worker iff a remote tier
    /// was configured.
    pub fn build(self) -> Result<TieredCache<S>, CacheError> {
        if self.namespace.is_empty() {
            return Err(CacheError::Configuration(
                "namespace must not be empty".into(),
            ));
        }
        if self.max_items == 0 {
            return Err(CacheError::Configuration(
                "max items must be greater than 0".into(),
            ));
        }

        let l1 = LruCache::with_expiration(self.max_items, Some(self.default_expiration))?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (write_behind_tx, worker) = match self.remote.clone() {
            Some(remote) => {
                // Capacity 1 approximates unbuffered, synchronous delivery:
                // it lets the writer enqueue one item ahead of the worker
                // before blocking.
                let (tx, rx) = mpsc::channel(1);
                let namespace = self.namespace.clone();
                let handle = tokio::spawn(run_write_behind(remote, namespace, rx, shutdown_rx));
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        Ok(TieredCache {
            l1: RwLock::new(l1),
            remote: self.remote,
            namespace: self.namespace,
            default_expiration: self.default_expiration,
            stats: Stats::new(),
            hooks: HookChain::new(),
            serializer: self.serializer,
            write_behind_tx,
            shutdown_tx,
            worker: StdMutex::new(worker),
        })
    }
}

/// The tiered cache core.
pub struct TieredCache<S: Serializer = JsonSerializer> {
    l1: RwLock<LruCache<String, Vec<u8>>>,
    remote: Option<Arc<dyn RemoteStore>>,
    namespace: String,
    default_expiration: Duration,
    stats: Stats,
    hooks: HookChain,
    serializer: S,
    write_behind_tx: Option<mpsc::Sender<CacheItem>>,
    shutdown_tx: watch::Sender<bool>,
    worker: StdMutex<Option<JoinHandle<()>>>,
}

impl<S: Serializer> TieredCache<S> {
    /// Registers a hook handler. Takes `&self`, not `&mut self`: the cache
    /// is shared via `Arc` once it is serving traffic, and the hook chain's
    /// own interior mutability keeps registration usable against that
    /// shared handle.
    pub fn add_hook(&self, handler: Box<dyn HookHandler>) {
        self.hooks.add(handler);
    }

    fn remote_key(&self, key: &str) -> String {
        format!("{}_{}", self.namespace, key)
    }

    fn warn_if_slow(&self, key: &str, elapsed: Duration) {
        if elapsed > OPTIMAL_IN_MEM_ACCESS_TIME {
            tracing::warn!(
                namespace = %self.namespace,
                key,
                duration = ?elapsed,
                "get cache has reached optimal access time"
            );
        }
    }

    /// Resolves the caller's ttl_seconds sentinel (negative ⇒ use default)
    /// into a `Duration` fed to the L1 store, whose own zero-or-default
    /// resolution takes over from there.
    fn resolve_set_ttl(&self, ttl_seconds: i64) -> Duration {
        if ttl_seconds <= 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(ttl_seconds as u64)
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: i64,
    ) -> Result<(), CacheError> {
        let key = key.to_string();
        self.hooks
            .run_async("set", || self.set_inner(key, value, ttl_seconds))
            .await
    }

    async fn set_inner<T: Serialize>(
        &self,
        key: String,
        value: &T,
        ttl_seconds: i64,
    ) -> Result<(), CacheError> {
        let bytes = self.serializer.encode(value)?;
        let ttl = self.resolve_set_ttl(ttl_seconds);

        {
            let mut l1 = self.l1.write().await;
            l1.add(key.clone(), bytes.clone(), ttl);
        }

        if let Some(tx) = &self.write_behind_tx {
            let effective_ttl = if ttl == Duration::ZERO {
                self.default_expiration
            } else {
                ttl
            };
            let item = CacheItem {
                key,
                value: bytes.clone(),
                ttl: effective_ttl,
                action: Action::Upsert,
            };
            if tx.send(item).await.is_err() {
                tracing::error!("write-behind worker is gone, dropping enqueued write");
            }
        }

        self.stats.record_write(bytes.len());
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Element, CacheError> {
        let key = key.to_string();
        self.hooks.run_async("get", || self.get_inner(key)).await
    }

    async fn get_inner(&self, key: String) -> Result<Element, CacheError> {
        self.stats.record_read_op();

        let start = Instant::now();
        let local = {
            let mut l1 = self.l1.write().await;
            l1.get(&key)
        };
        self.warn_if_slow(&key, start.elapsed());

        if let Some(bytes) = local {
            self.stats.record_hit();
            self.stats.add_read_bytes(bytes.len());
            return Ok(Element::new(bytes));
        }

        let Some(remote) = &self.remote else {
            self.stats.record_miss();
            return Err(CacheError::NotFound);
        };

        let remote_key = self.remote_key(&key);
        let start = Instant::now();
        let remote_value = remote.get(&remote_key).await?;
        self.warn_if_slow(&key, start.elapsed());

        match remote_value {
            None => {
                self.stats.record_miss();
                Err(CacheError::NotFound)
            }
            Some(bytes) => {
                self.stats.record_hit();
                self.stats.add_read_bytes(bytes.len());
                Ok(Element::new(bytes))
            }
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let key = key.to_string();
        self.hooks.run_async("delete", || self.delete_inner(key)).await
    }

    async fn delete_inner(&self, key: String) -> Result<(), CacheError> {
        {
            let mut l1 = self.l1.write().await;
            l1.remove(&key);
        }

        if let Some(tx) = &self.write_behind_tx {
            let item = CacheItem {
                key,
                value: Vec::new(),
                ttl: Duration::ZERO,
                action: Action::Delete,
            };
            if tx.send(item).await.is_err() {
                tracing::error!("write-behind worker is gone, dropping enqueued delete");
            }
        }

        self.stats.record_operation();
        Ok(())
    }

    pub async fn contains(&self, key: &str) -> bool {
        let key = key.to_string();
        self.hooks
            .run_async("contains", || self.contains_inner(key))
            .await
    }

    async fn contains_inner(&self, key: String) -> bool {
        let found_locally = {
            let l1 = self.l1.read().await;
            l1.contains(&key)
        };

        let result = if found_locally {
            true
        } else if let Some(remote) = &self.remote {
            let remote_key = self.remote_key(&key);
            match remote.exists(&remote_key).await {
                Ok(exists) => exists,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "exists check on remote cache failed");
                    false
                }
            }
        } else {
            false
        };

        self.stats.record_operation();
        result
    }

    pub async fn flush(&self) -> Result<(), CacheError> {
        self.hooks.run_async("flush", || self.flush_inner()).await
    }

    async fn flush_inner(&self) -> Result<(), CacheError> {
        {
            let mut l1 = self.l1.write().await;
            l1.purge();
        }

        if let Some(remote) = &self.remote {
            // The scan prefix includes the `<namespace>_` delimiter used by
            // `remote_key` so a namespace that is a prefix of another
            // namespace (e.g. "A" vs "AB") cannot match that namespace's keys.
            let scan_prefix = format!("{}_", self.namespace);
            let mut cursor = 0u64;
            let mut remote_keys = Vec::new();
            loop {
                let (keys, next_cursor) = remote.scan(cursor, &scan_prefix, 10).await?;
                remote_keys.extend(keys);
                if next_cursor == 0 {
                    break;
                }
                cursor = next_cursor;
            }

            for key in remote_keys {
                remote.delete(&key).await?;
            }
        }

        self.stats.reset();
        Ok(())
    }

    /// A human-readable snapshot of all statistics.
    pub async fn report(&self) -> String {
        self.hooks
            .run_async("report", || async { self.stats.snapshot().report() })
            .await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Cancels the write-behind worker, drains any in-flight items with a
    /// short deadline, and hands the L2 handle back to the caller. The L1
    /// store is dropped with `self`.
    pub async fn shutdown(self) -> Option<Arc<dyn RemoteStore>> {
        let _ = self.shutdown_tx.send(true);

        if let Some(tx) = &self.write_behind_tx {
            let _ = tokio::time::timeout(Duration::from_millis(200), async {
                while tx.capacity() < tx.max_capacity() {
                    tokio::task::yield_now().await;
                }
            })
            .await;
        }

        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = tokio::time::timeout(Duration::from_millis(200), handle).await;
        }

        self.remote
    }
}

async fn run_write_behind(
    remote: Arc<dyn RemoteStore>,
    namespace: String,
    mut rx: mpsc::Receiver<CacheItem>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
            }
            item = rx.recv() => {
                let Some(item) = item else { return };
                let remote_key = format!("{namespace}_{}", item.key);
                let result = match item.action {
                    Action::Upsert => remote.set(&remote_key, &item.value, item.ttl).await,
                    Action::Delete => remote.delete(&remote_key).await,
                };
                if let Err(e) = result {
                    tracing::error!(key = %remote_key, error = %e, "write-behind apply to remote cache failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::l2::RemoteStore;
    use std::collections::HashMap;
    use std::sync::Mutex as StdSyncMutex;
    use tokio::time::sleep;

    #[derive(Default)]
    struct FakeRemote {
        store: StdSyncMutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl RemoteStore for FakeRemote {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Ok(self.store.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
            self.store
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.store.lock().unwrap().remove(key);
            Ok(())
        }

        async fn exists(&self, key: &str) -> Result<bool, CacheError> {
            Ok(self.store.lock().unwrap().contains_key(key))
        }

        async fn scan(
            &self,
            _cursor: u64,
            pattern: &str,
            _batch: usize,
        ) -> Result<(Vec<String>, u64), CacheError> {
            let keys = self
                .store
                .lock()
                .unwrap()
                .keys()
                .filter(|k| k.starts_with(pattern))
                .cloned()
                .collect();
            Ok((keys, 0))
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn set_then_get_round_trips_through_l1() {
        let cache = TieredCacheBuilder::new().max_items(10).build().unwrap();
        cache.set("k", &"hello".to_string(), 60).await.unwrap();
        let element = cache.get("k").await.unwrap();
        assert_eq!(element.as_string().unwrap(), "\"hello\"");
    }

    #[tokio::test]
    async fn get_on_miss_without_remote_is_not_found() {
        let cache = TieredCacheBuilder::new().max_items(10).build().unwrap();
        let err = cache.get("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(cache.stats().total_misses, 1);
    }

    #[tokio::test]
    async fn tiered_read_through_from_remote_then_served_from_l1() {
        let remote = Arc::new(FakeRemote::default());
        remote
            .set("ns_x", &serde_json::to_vec("hello").unwrap(), Duration::from_secs(60))
            .await
            .unwrap();

        let cache: TieredCache = TieredCacheBuilder::new()
            .namespace("ns")
            .max_items(10)
            .remote(remote.clone())
            .build()
            .unwrap();

        let element = cache.get("x").await.unwrap();
        assert_eq!(element.as_string().unwrap(), "\"hello\"");
        assert_eq!(cache.stats().total_hits, 1);
        assert_eq!(cache.stats().total_misses, 0);

        // Wipe the remote entirely and confirm the second read is served
        // purely from L1.
        remote.delete("ns_x").await.unwrap();
        let element = cache.get("x").await.unwrap();
        assert_eq!(element.as_string().unwrap(), "\"hello\"");
    }

    #[tokio::test]
    async fn write_behind_reaches_remote_asynchronously() {
        let remote = Arc::new(FakeRemote::default());
        let cache: TieredCache = TieredCacheBuilder::new()
            .namespace("ns")
            .max_items(10)
            .remote(remote.clone())
            .build()
            .unwrap();

        cache.set("k", &42i32, 60).await.unwrap();

        let mut seen = false;
        for _ in 0..50 {
            if remote.get("ns_k").await.unwrap().is_some() {
                seen = true;
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(seen, "write-behind never reached the remote store");
    }

    #[tokio::test]
    async fn flush_only_removes_its_own_namespace() {
        let remote = Arc::new(FakeRemote::default());

        let cache_a: TieredCache = TieredCacheBuilder::new()
            .namespace("A")
            .max_items(10)
            .remote(remote.clone())
            .build()
            .unwrap();
        let cache_b: TieredCache = TieredCacheBuilder::new()
            .namespace("B")
            .max_items(10)
            .remote(remote.clone())
            .build()
            .unwrap();

        cache_a.set("foo", &1i32, 60).await.unwrap();
        cache_b.set("foo", &1i32, 60).await.unwrap();

        for _ in 0..50 {
            if remote.get("A_foo").await.unwrap().is_some()
                && remote.get("B_foo").await.unwrap().is_some()
            {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        cache_a.flush().await.unwrap();

        assert!(remote.get("A_foo").await.unwrap().is_none());
        assert!(cache_b.contains("foo").await);
    }

    #[tokio::test]
    async fn delete_removes_from_l1_unconditionally() {
        let cache = TieredCacheBuilder::new().max_items(10).build().unwrap();
        cache.set("k", &1i32, 60).await.unwrap();
        cache.delete("k").await.unwrap();
        assert!(cache.get("k").await.is_err());
    }

    #[tokio::test]
    async fn namespace_must_not_be_empty() {
        let result = TieredCacheBuilder::new().namespace("").build();
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[tokio::test]
    async fn max_items_must_be_positive() {
        let result = TieredCacheBuilder::new().max_items(0).build();
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    struct RecordingHook {
        events: Arc<StdSyncMutex<Vec<String>>>,
        label: &'static str,
    }

    impl HookHandler for RecordingHook {
        fn before(&self, ctx: crate::cache::hook::HookContext, op: &str) -> crate::cache::hook::HookContext {
            self.events
                .lock()
                .unwrap()
                .push(format!("{}:before:{}", self.label, op));
            ctx
        }

        fn after(&self, _ctx: &crate::cache::hook::HookContext, op: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{}:after:{}", self.label, op));
        }
    }

    #[tokio::test]
    async fn hooks_registered_through_add_hook_run_in_order_around_tiered_operations() {
        let events = Arc::new(StdSyncMutex::new(Vec::new()));
        let cache = Arc::new(TieredCacheBuilder::new().max_items(10).build().unwrap());
        cache.add_hook(Box::new(RecordingHook {
            events: events.clone(),
            label: "h1",
        }));
        cache.add_hook(Box::new(RecordingHook {
            events: events.clone(),
            label: "h2",
        }));

        cache.set("k", &1i32, 60).await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["h1:before:set", "h2:before:set", "h1:after:set", "h2:after:set"]
        );
    }
}
