use std::collections::VecDeque;

/// FIFO buffer for messages submitted while the connection is down.
///
/// Bounded: pushing into a full queue evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct OutboundQueue<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> OutboundQueue<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append to the tail, returning the evicted head if the queue was full.
    pub fn push(&mut self, entry: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(entry);
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Put an entry back at the head after a failed transmit.
    pub fn requeue(&mut self, entry: T) {
        self.entries.push_front(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_insertion_order() {
        let mut queue = OutboundQueue::new(10);
        queue.push("a");
        queue.push("b");
        queue.push("c");

        let drained: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_evicts_oldest() {
        let mut queue = OutboundQueue::new(2);
        assert_eq!(queue.push(1), None);
        assert_eq!(queue.push(2), None);
        assert_eq!(queue.push(3), Some(1));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
    }

    #[test]
    fn requeue_goes_to_head() {
        let mut queue = OutboundQueue::new(3);
        queue.push(2);
        queue.push(3);
        queue.requeue(1);

        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let mut queue = OutboundQueue::new(0);
        assert_eq!(queue.push("x"), Some("x"));
        assert!(queue.is_empty());
    }
}
