//! Insertion-Order Tracker Module
//!
//! Tracks insertion order for FIFO eviction.
//!
//! Deliberately not LRU: reads never reorder entries, and overwriting an
//! existing key keeps its original slot. Eviction always removes the
//! oldest-inserted key.

use std::collections::VecDeque;

// == Insert Order Tracker ==
/// Tracks cache keys in insertion order.
///
/// Keys are stored in a VecDeque where:
/// - Front = Oldest inserted (next eviction candidate)
/// - Back = Most recently inserted
#[derive(Debug, Default)]
pub struct InsertOrder {
    /// Keys ordered by first insertion
    order: VecDeque<String>,
}

impl InsertOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Record ==
    /// Records a key as inserted.
    ///
    /// A key already tracked keeps its original position; only first
    /// insertion determines eviction order.
    pub fn record(&mut self, key: &str) {
        if !self.contains(key) {
            self.order.push_back(key.to_string());
        }
    }

    // == Remove ==
    /// Removes a key from the tracker. Absent keys are a no-op.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Pop Oldest ==
    /// Returns and removes the oldest-inserted key.
    ///
    /// Returns None if the tracker is empty.
    pub fn pop_oldest(&mut self) -> Option<String> {
        self.order.pop_front()
    }

    // == Peek Oldest ==
    /// Returns the oldest-inserted key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.front()
    }

    // == Clear ==
    /// Drops every tracked key.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}
