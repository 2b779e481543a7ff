//! A thread-safe wrapper around [`LruCache`], for callers that want a
//! standalone L1 store without going through the tiered cache.
//!
//! The tiered cache does **not** use this type: it owns a private
//! `LruCache` under its own single write lock.

use std::hash::Hash;
use std::time::Duration;

use tokio::sync::RwLock;

use super::error::CacheError;
use super::hook::HookChain;
use super::lru::LruCache;

pub struct SharedLru<K, V> {
    inner: RwLock<LruCache<K, V>>,
    hooks: HookChain,
}

impl<K, V> SharedLru<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        Ok(Self {
            inner: RwLock::new(LruCache::new(capacity)?),
            hooks: HookChain::new(),
        })
    }

    pub fn add_hook(&mut self, handler: Box<dyn super::hook::HookHandler>) {
        self.hooks.add(handler);
    }

    pub async fn add(&self, key: K, value: V, ttl: Duration) -> bool {
        let mut guard = self.inner.write().await;
        self.hooks.run("add", || guard.add(key, value, ttl))
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.write().await;
        self.hooks.run("get", || guard.get(key))
    }

    pub async fn peek(&self, key: &K) -> Option<V> {
        let guard = self.inner.read().await;
        self.hooks.run("peek", || guard.peek(key))
    }

    pub async fn contains(&self, key: &K) -> bool {
        let guard = self.inner.read().await;
        self.hooks.run("contains", || guard.contains(key))
    }

    pub async fn remove(&self, key: &K) -> bool {
        let mut guard = self.inner.write().await;
        self.hooks.run("remove", || guard.remove(key))
    }

    pub async fn keys(&self) -> Vec<K> {
        let guard = self.inner.read().await;
        self.hooks.run("keys", || guard.keys())
    }

    pub async fn len(&self) -> usize {
        let guard = self.inner.read().await;
        self.hooks.run("len", || guard.len())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn purge(&self) {
        let mut guard = self.inner.write().await;
        self.hooks.run("purge", || guard.purge());
    }
}
