//! Bounded window of recently seen ring nonces.

use std::collections::{HashSet, VecDeque};

/// FIFO set of the last `capacity` nonces.
///
/// A capacity of zero disables de-duplication: every nonce is new.
#[derive(Debug, Clone, Default)]
pub struct NonceWindow {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl NonceWindow {
    /// Create a window remembering at most `capacity` nonces.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, order: VecDeque::with_capacity(capacity), seen: HashSet::new() }
    }

    /// Record `nonce`. Returns `false` if it is already in the window.
    pub fn insert(&mut self, nonce: &str) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if self.seen.contains(nonce) {
            return false;
        }

        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        self.order.push_back(nonce.to_string());
        self.seen.insert(nonce.to_string());
        true
    }

    /// Number of remembered nonces.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_window_accepts_duplicates() {
        let mut window = NonceWindow::new(0);
        assert!(window.insert("a"));
        assert!(window.insert("a"));
        assert!(window.is_empty());
    }

    #[test]
    fn duplicates_inside_window_are_refused() {
        let mut window = NonceWindow::new(2);
        assert!(window.insert("a"));
        assert!(window.insert("b"));
        assert!(!window.insert("a"));

        // "c" evicts "a"
        assert!(window.insert("c"));
        assert_eq!(window.len(), 2);
        assert!(window.insert("a"));
        assert!(!window.insert("c"));
    }
}
