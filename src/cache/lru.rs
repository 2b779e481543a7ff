//! A bounded, expiration-aware LRU store.
//!
//! The recency list is an arena: a flat `Vec` of slots plus a free list of
//! reclaimed indices, with `prev`/`next` stored as indices rather than
//! pointers. This keeps every operation O(1) and avoids lifetime
//! entanglement that a pointer- or `Rc`-based linked list would otherwise
//! force on callers.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use super::error::CacheError;

type Callback<K, V> = Box<dyn FnMut(K, V) + Send>;

struct Slot<K, V> {
    key: K,
    value: V,
    expires_at: Option<Instant>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A single-threaded, fixed-capacity LRU cache with optional per-entry
/// expiration and an optional eviction callback.
pub struct LruCache<K, V> {
    capacity: usize,
    default_ttl: Option<Duration>,
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    on_evict: Option<Callback<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Constructs an LRU of the given size. Fails on non-positive capacity
    /// (the only constructor-time failure).
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        Self::with_expiration(capacity, None)
    }

    pub fn with_expiration(
        capacity: usize,
        default_ttl: Option<Duration>,
    ) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::Configuration(
                "must provide a positive capacity".into(),
            ));
        }
        Ok(Self {
            capacity,
            default_ttl,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            on_evict: None,
        })
    }

    pub fn set_on_evict(&mut self, callback: Callback<K, V>) {
        self.on_evict = Some(callback);
    }

    fn resolve_expiry(&self, ttl: Duration) -> Option<Instant> {
        if ttl > Duration::ZERO {
            Some(Instant::now() + ttl)
        } else if let Some(default_ttl) = self.default_ttl {
            if default_ttl > Duration::ZERO {
                Some(Instant::now() + default_ttl)
            } else {
                None
            }
        } else {
            None
        }
    }

    fn is_expired(slot: &Slot<K, V>) -> bool {
        slot.expires_at.is_some_and(|t| Instant::now() >= t)
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.slots[idx].as_ref().unwrap();
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let slot = self.slots[idx].as_mut().unwrap();
            slot.prev = None;
            slot.next = old_head;
        }
        if let Some(h) = old_head {
            self.slots[h].as_mut().unwrap().prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.attach_front(idx);
    }

    fn alloc_slot(&mut self, slot: Slot<K, V>) -> usize {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(slot);
            idx
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        }
    }

    fn destroy(&mut self, idx: usize) -> (K, V) {
        self.detach(idx);
        let slot = self.slots[idx].take().unwrap();
        self.free.push(idx);
        self.index.remove(&slot.key);
        if let Some(cb) = self.on_evict.as_mut() {
            cb(slot.key.clone(), slot.value.clone());
        }
        (slot.key, slot.value)
    }

    /// Adds a value to the cache, refreshing recency. Returns `true` iff an
    /// eviction fired to make room.
    pub fn add(&mut self, key: K, value: V, ttl: Duration) -> bool {
        let expires_at = self.resolve_expiry(ttl);

        if let Some(&idx) = self.index.get(&key) {
            {
                let slot = self.slots[idx].as_mut().unwrap();
                slot.value = value;
                slot.expires_at = expires_at;
            }
            self.move_to_front(idx);
            return false;
        }

        let idx = self.alloc_slot(Slot {
            key: key.clone(),
            value,
            expires_at,
            prev: None,
            next: None,
        });
        self.index.insert(key, idx);
        self.attach_front(idx);

        if self.index.len() > self.capacity {
            if let Some(tail) = self.tail {
                self.destroy(tail);
            }
            return true;
        }
        false
    }

    /// Looks up a key, moving it to the front on a live hit. An expired hit
    /// returns `false` but does not remove the entry (lazy expiration).
    pub fn get(&mut self, key: &K) -> Option<V> {
        let idx = *self.index.get(key)?;
        if Self::is_expired(self.slots[idx].as_ref().unwrap()) {
            return None;
        }
        self.move_to_front(idx);
        Some(self.slots[idx].as_ref().unwrap().value.clone())
    }

    /// Like `get` but never touches recency.
    pub fn peek(&self, key: &K) -> Option<V> {
        let idx = *self.index.get(key)?;
        let slot = self.slots[idx].as_ref().unwrap();
        if Self::is_expired(slot) {
            return None;
        }
        Some(slot.value.clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index
            .get(key)
            .map(|&idx| !Self::is_expired(self.slots[idx].as_ref().unwrap()))
            .unwrap_or(false)
    }

    /// Checks for `key` without touching recency and, if absent, adds it.
    /// Returns `(found, evicted)`.
    pub fn contains_or_add(&mut self, key: K, value: V, ttl: Duration) -> (bool, bool) {
        if self.contains(&key) {
            return (true, false);
        }
        (false, self.add(key, value, ttl))
    }

    /// Peeks `key` without touching recency and, if absent, adds it.
    /// Returns `(previous, found, evicted)`.
    pub fn peek_or_add(&mut self, key: K, value: V, ttl: Duration) -> (Option<V>, bool, bool) {
        if let Some(previous) = self.peek(&key) {
            return (Some(previous), true, false);
        }
        (None, false, self.add(key, value, ttl))
    }

    /// Removes `key`. Returns `true` iff it was structurally present (an
    /// already-expired entry still counts and still fires the callback).
    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.get(key).copied() {
            Some(idx) => {
                self.destroy(idx);
                true
            }
            None => false,
        }
    }

    pub fn remove_oldest(&mut self) -> Option<(K, V)> {
        let tail = self.tail?;
        Some(self.destroy(tail))
    }

    pub fn get_oldest(&self) -> Option<(&K, &V)> {
        let tail = self.tail?;
        let slot = self.slots[tail].as_ref().unwrap();
        Some((&slot.key, &slot.value))
    }

    /// Returns keys oldest to newest.
    pub fn keys(&self) -> Vec<K> {
        let mut result = Vec::with_capacity(self.index.len());
        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            let slot = self.slots[idx].as_ref().unwrap();
            result.push(slot.key.clone());
            cursor = slot.prev;
        }
        result
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Fires the eviction callback for every live entry, then resets to
    /// empty.
    pub fn purge(&mut self) {
        while self.remove_oldest().is_some() {}
        self.slots.clear();
        self.free.clear();
        debug_assert!(self.index.is_empty());
    }

    /// Evicts the oldest entries until `len() <= size`, then sets capacity
    /// to `size`. Returns the number evicted.
    pub fn resize(&mut self, size: usize) -> usize {
        let diff = self.index.len().saturating_sub(size);
        for _ in 0..diff {
            self.remove_oldest();
        }
        self.capacity = size;
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread::sleep;

    fn evicted_log<K: Send + 'static, V: Send + 'static>() -> (Arc<Mutex<Vec<K>>>, Callback<K, V>)
    {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let cb: Callback<K, V> = Box::new(move |k, _v| log_clone.lock().unwrap().push(k));
        (log, cb)
    }

    #[test]
    fn capacity_invariant_holds_after_inserts() {
        let mut lru: LruCache<i32, &str> = LruCache::new(2).unwrap();
        lru.add(1, "a", Duration::ZERO);
        lru.add(2, "b", Duration::ZERO);
        lru.add(3, "c", Duration::ZERO);
        assert!(lru.len() <= 2);
    }

    #[test]
    fn oldest_entry_is_evicted_when_capacity_is_exceeded() {
        let (log, cb) = evicted_log::<i32, &str>();
        let mut lru: LruCache<i32, &str> = LruCache::new(2).unwrap();
        lru.set_on_evict(cb);

        assert!(!lru.add(1, "a", Duration::ZERO));
        assert!(!lru.add(2, "b", Duration::ZERO));
        assert!(lru.add(3, "c", Duration::ZERO));

        assert!(!lru.contains(&1));
        assert_eq!(lru.get(&2), Some("b"));
        assert_eq!(lru.get(&3), Some("c"));
        assert_eq!(lru.len(), 2);
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[test]
    fn get_refreshes_recency() {
        let mut lru: LruCache<i32, &str> = LruCache::new(2).unwrap();
        lru.add(1, "a", Duration::ZERO);
        lru.add(2, "b", Duration::ZERO);
        lru.get(&1);
        lru.add(3, "c", Duration::ZERO);

        assert!(lru.contains(&1));
        assert!(!lru.contains(&2));
        assert!(lru.contains(&3));
    }

    #[test]
    fn peek_does_not_move_recency() {
        let mut lru: LruCache<i32, &str> = LruCache::new(2).unwrap();
        lru.add(1, "a", Duration::ZERO);
        lru.add(2, "b", Duration::ZERO);
        lru.peek(&1);
        lru.add(3, "c", Duration::ZERO);

        assert!(!lru.contains(&1));
        assert!(lru.contains(&3));
    }

    #[test]
    fn expiration_masks_get_and_counts_as_miss() {
        let mut lru: LruCache<&str, &str> = LruCache::new(10).unwrap();
        lru.add("k", "v", Duration::from_millis(50));
        sleep(Duration::from_millis(120));
        assert_eq!(lru.get(&"k"), None);
        assert!(!lru.contains(&"k"));
        assert!(!lru.peek(&"k").is_some());
    }

    #[test]
    fn expired_entry_is_not_proactively_removed() {
        let mut lru: LruCache<&str, &str> = LruCache::new(10).unwrap();
        lru.add("k", "v", Duration::from_millis(20));
        sleep(Duration::from_millis(60));
        assert_eq!(lru.get(&"k"), None);
        assert!(lru.index.contains_key("k"));
    }

    #[test]
    fn add_of_existing_key_is_not_an_eviction() {
        let mut lru: LruCache<i32, &str> = LruCache::new(1).unwrap();
        assert!(!lru.add(1, "a", Duration::ZERO));
        assert!(!lru.add(1, "b", Duration::ZERO));
        assert_eq!(lru.get(&1), Some("b"));
    }

    #[test]
    fn remove_of_expired_entry_still_fires_callback_and_returns_true() {
        let (log, cb) = evicted_log::<&str, &str>();
        let mut lru: LruCache<&str, &str> = LruCache::new(10).unwrap();
        lru.set_on_evict(cb);
        lru.add("k", "v", Duration::from_millis(10));
        sleep(Duration::from_millis(40));
        assert!(lru.remove(&"k"));
        assert_eq!(*log.lock().unwrap(), vec!["k"]);
    }

    #[test]
    fn resize_down_evicts_oldest_first() {
        let mut lru: LruCache<i32, &str> = LruCache::new(5).unwrap();
        lru.add(1, "a", Duration::ZERO);
        lru.add(2, "b", Duration::ZERO);
        lru.add(3, "c", Duration::ZERO);
        let evicted = lru.resize(1);
        assert_eq!(evicted, 2);
        assert_eq!(lru.len(), 1);
        assert!(lru.contains(&3));
    }

    #[test]
    fn resize_to_len_or_more_is_a_no_op_besides_capacity() {
        let mut lru: LruCache<i32, &str> = LruCache::new(5).unwrap();
        lru.add(1, "a", Duration::ZERO);
        lru.add(2, "b", Duration::ZERO);
        assert_eq!(lru.resize(10), 0);
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn purge_fires_callback_for_every_live_entry() {
        let (log, cb) = evicted_log::<i32, &str>();
        let mut lru: LruCache<i32, &str> = LruCache::new(5).unwrap();
        lru.set_on_evict(cb);
        lru.add(1, "a", Duration::ZERO);
        lru.add(2, "b", Duration::ZERO);
        lru.purge();
        assert_eq!(lru.len(), 0);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn keys_are_ordered_oldest_to_newest() {
        let mut lru: LruCache<i32, &str> = LruCache::new(5).unwrap();
        lru.add(1, "a", Duration::ZERO);
        lru.add(2, "b", Duration::ZERO);
        lru.add(3, "c", Duration::ZERO);
        assert_eq!(lru.keys(), vec![1, 2, 3]);
    }

    #[test]
    fn zero_capacity_is_a_configuration_error() {
        let result: Result<LruCache<i32, i32>, _> = LruCache::new(0);
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[test]
    fn contains_or_add_only_adds_when_absent() {
        let mut lru: LruCache<i32, &str> = LruCache::new(5).unwrap();
        let (found, evicted) = lru.contains_or_add(1, "a", Duration::ZERO);
        assert!(!found);
        assert!(!evicted);
        let (found, evicted) = lru.contains_or_add(1, "b", Duration::ZERO);
        assert!(found);
        assert!(!evicted);
        assert_eq!(lru.peek(&1), Some("a"));
    }

    #[test]
    fn index_list_agreement_after_many_operations() {
        let mut lru: LruCache<i32, i32> = LruCache::new(3).unwrap();
        for i in 0..10 {
            lru.add(i, i, Duration::ZERO);
        }
        assert_eq!(lru.len(), 3);
        assert_eq!(lru.index.len(), lru.len());
        let keys = lru.keys();
        assert_eq!(keys.len(), lru.len());
        for k in &keys {
            assert!(lru.contains(k));
        }
    }
}
