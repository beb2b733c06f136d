//! Bounded Cache Store Module
//!
//! The local mirror of remote keys: HashMap storage plus an explicit
//! insertion-order index for FIFO eviction.
//!
//! The store is not synchronized itself; callers share it as
//! `Arc<RwLock<BoundedCache>>` and must not hold the lock across a
//! network await.

use std::collections::HashMap;

use crate::cache::InsertOrder;

// == Bounded Cache ==
/// Fixed-capacity key-value mirror with insertion-order eviction.
#[derive(Debug)]
pub struct BoundedCache {
    /// Key-value storage
    entries: HashMap<String, String>,
    /// Insertion-order index for eviction
    order: InsertOrder,
    /// Maximum number of entries (None = unbounded)
    capacity: Option<usize>,
}

impl BoundedCache {
    // == Constructor ==
    /// Creates a new BoundedCache with the given capacity.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, or None for unbounded.
    ///   A capacity of zero is treated as unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            order: InsertOrder::new(),
            capacity: capacity.filter(|&c| c > 0),
        }
    }

    // == Get ==
    /// Returns the cached value for a key, if present.
    ///
    /// Reads never reorder entries; eviction order is strictly
    /// first-inserted-first-out.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    // == Insert ==
    /// Stores a key-value pair, evicting the oldest-inserted entry first
    /// if the cache is at capacity.
    ///
    /// Overwriting an existing key never evicts and keeps the key's
    /// original insertion slot.
    ///
    /// # Returns
    /// The evicted key, if an eviction occurred.
    pub fn insert(&mut self, key: String, value: String) -> Option<String> {
        let is_overwrite = self.entries.contains_key(&key);

        let mut evicted = None;
        if !is_overwrite {
            if let Some(capacity) = self.capacity {
                if self.entries.len() >= capacity {
                    if let Some(oldest) = self.order.pop_oldest() {
                        self.entries.remove(&oldest);
                        evicted = Some(oldest);
                    }
                }
            }
        }

        self.order.record(&key);
        self.entries.insert(key, value);

        evicted
    }

    // == Delete ==
    /// Removes an entry by key.
    ///
    /// Deleting an absent key is a no-op, never an error: the key may
    /// already have been evicted or never cached.
    ///
    /// # Returns
    /// `true` if an entry was actually removed.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.remove(key);
            true
        } else {
            false
        }
    }

    // == Clear ==
    /// Removes every entry.
    ///
    /// # Returns
    /// The number of entries removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.order.clear();
        removed
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Capacity ==
    /// Returns the configured capacity (None = unbounded).
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_new() {
        let store = BoundedCache::new(Some(100));
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.capacity(), Some(100));
    }

    #[test]
    fn test_store_insert_and_get() {
        let mut store = BoundedCache::new(Some(100));

        store.insert("key1".to_string(), "value1".to_string());

        assert_eq!(store.get("key1"), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let store = BoundedCache::new(Some(100));
        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_store_delete() {
        let mut store = BoundedCache::new(Some(100));

        store.insert("key1".to_string(), "value1".to_string());
        assert!(store.delete("key1"));

        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_store_delete_nonexistent_is_noop() {
        let mut store = BoundedCache::new(Some(100));

        store.insert("key1".to_string(), "value1".to_string());
        assert!(!store.delete("nonexistent"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_overwrite_does_not_evict() {
        let mut store = BoundedCache::new(Some(2));

        store.insert("key1".to_string(), "value1".to_string());
        store.insert("key2".to_string(), "value2".to_string());

        // Overwrite at capacity: no eviction, value replaced
        let evicted = store.insert("key1".to_string(), "value3".to_string());

        assert_eq!(evicted, None);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("key1"), Some("value3".to_string()));
        assert_eq!(store.get("key2"), Some("value2".to_string()));
    }

    #[test]
    fn test_store_fifo_eviction() {
        let mut store = BoundedCache::new(Some(2));

        store.insert("a".to_string(), "1".to_string());
        store.insert("b".to_string(), "2".to_string());

        // Cache is full: inserting c evicts a (oldest inserted), not b
        let evicted = store.insert("c".to_string(), "3".to_string());

        assert_eq!(evicted, Some("a".to_string()));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), Some("2".to_string()));
        assert_eq!(store.get("c"), Some("3".to_string()));
    }

    #[test]
    fn test_store_reads_do_not_affect_eviction() {
        let mut store = BoundedCache::new(Some(2));

        store.insert("a".to_string(), "1".to_string());
        store.insert("b".to_string(), "2".to_string());

        // Under LRU this read would rescue "a"; FIFO must still evict it
        assert!(store.get("a").is_some());
        let evicted = store.insert("c".to_string(), "3".to_string());

        assert_eq!(evicted, Some("a".to_string()));
    }

    #[test]
    fn test_store_capacity_invariant() {
        let mut store = BoundedCache::new(Some(3));

        for i in 0..20 {
            store.insert(format!("key{}", i), "value".to_string());
            assert!(store.len() <= 3);
        }
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_store_unbounded() {
        let mut store = BoundedCache::new(None);

        for i in 0..1000 {
            let evicted = store.insert(format!("key{}", i), "value".to_string());
            assert_eq!(evicted, None);
        }
        assert_eq!(store.len(), 1000);
    }

    #[test]
    fn test_store_clear() {
        let mut store = BoundedCache::new(Some(10));

        store.insert("key1".to_string(), "value1".to_string());
        store.insert("key2".to_string(), "value2".to_string());

        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_store_eviction_after_delete() {
        let mut store = BoundedCache::new(Some(2));

        store.insert("a".to_string(), "1".to_string());
        store.insert("b".to_string(), "2".to_string());
        store.delete("a");
        store.insert("c".to_string(), "3".to_string());

        // Room was made by the delete, so nothing is evicted; next
        // eviction candidate is now b.
        let evicted = store.insert("d".to_string(), "4".to_string());
        assert_eq!(evicted, Some("b".to_string()));
    }
}
