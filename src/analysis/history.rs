// src/analysis/history.rs
//
// Fixed-capacity FIFO window. Pushing into a full window evicts the
// oldest sample, so memory stays constant for the whole session.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample, returning the evicted one when the window was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(value);
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(value);
        evicted
    }

    /// Oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_first() {
        let mut window = RingBuffer::with_capacity(3);
        assert_eq!(window.push(1), None);
        assert_eq!(window.push(2), None);
        assert_eq!(window.push(3), None);
        assert_eq!(window.push(4), Some(1));
        assert_eq!(window.push(5), Some(2));

        assert_eq!(window.len(), 3);
        assert_eq!(window.to_vec(), vec![3, 4, 5]);
        assert_eq!(window.iter().next_back(), Some(&5));
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut window = RingBuffer::with_capacity(15);
        for i in 0..100u64 {
            window.push(i);
            assert!(window.len() <= 15);
        }
        assert_eq!(window.iter().next(), Some(&85));
    }
}
