use std::collections::VecDeque;

/// FIFO of one-time prekeys published by an account.
///
/// Bounded at twice the replenishment target. Owned by the account actor, so
/// concurrent fetches by many peers are serialized and never hand out the
/// same key twice.
#[derive(Debug, Clone)]
pub struct PrekeyPool {
    keys: VecDeque<String>,
    target: usize,
}

impl PrekeyPool {
    pub fn new(target: usize) -> Self {
        Self {
            keys: VecDeque::new(),
            target,
        }
    }

    pub fn from_keys(keys: Vec<String>, target: usize) -> Self {
        Self {
            keys: keys.into(),
            target,
        }
    }

    pub fn max(&self) -> usize {
        2 * self.target
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All-or-nothing append. Returns false, leaving the pool untouched, if
    /// the result would exceed [`max`](Self::max).
    pub fn add(&mut self, new_keys: Vec<String>) -> bool {
        if self.keys.len() + new_keys.len() > self.max() {
            return false;
        }
        self.keys.extend(new_keys);
        true
    }

    /// Remove and return the oldest key.
    pub fn fetch(&mut self) -> Option<String> {
        self.keys.pop_front()
    }

    /// Put a key back at the front, undoing a [`fetch`](Self::fetch).
    pub fn unfetch(&mut self, key: String) {
        self.keys.push_front(key);
    }

    pub fn truncate(&mut self, len: usize) {
        self.keys.truncate(len);
    }

    pub fn needs_replenishment(&self) -> bool {
        self.keys.len() < self.target
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }
}
