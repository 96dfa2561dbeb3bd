//! Blocking FIFO used to move frames from the capture thread to the watch thread.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Unbounded multi-producer, multi-consumer queue with a blocking `pop`.
///
/// `push` never blocks and wakes at most one waiting consumer. `pop` parks the
/// caller on a condition variable until an item is queued.
pub struct BlockingHandoff<T> {
    queue: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> BlockingHandoff<T> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    pub fn push(&self, item: T) {
        {
            let mut queue = self.lock();
            queue.push_back(item);
        }
        self.available.notify_one();
    }

    pub fn pop(&self) -> T {
        let mut queue = self.lock();
        loop {
            if let Some(item) = queue.pop_front() {
                return item;
            }
            queue = self
                .available
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Number of queued items. Only a hint once other threads are involved.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panicking producer cannot leave the deque half-modified, so a poisoned
    // lock still guards a consistent queue.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for BlockingHandoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pops_in_push_order() {
        let handoff = BlockingHandoff::new();
        for i in 0..5 {
            handoff.push(i);
        }

        let popped: Vec<_> = (0..5).map(|_| handoff.pop()).collect();
        assert_eq!(popped, vec![0, 1, 2, 3, 4]);
        assert!(handoff.is_empty());
    }

    #[test]
    fn pop_waits_for_push() {
        let handoff = Arc::new(BlockingHandoff::new());
        let (done_tx, done_rx) = mpsc::channel();

        let consumer = {
            let handoff = Arc::clone(&handoff);
            thread::spawn(move || {
                let item = handoff.pop();
                done_tx.send(()).unwrap();
                item
            })
        };

        // Nothing has been pushed, so the consumer must still be parked.
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

        handoff.push("frame");
        assert_eq!(consumer.join().unwrap(), "frame");
        assert!(done_rx.try_recv().is_ok());
    }

    #[test]
    fn many_producers_deliver_everything() {
        let handoff = Arc::new(BlockingHandoff::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let handoff = Arc::clone(&handoff);
                thread::spawn(move || {
                    for i in 0..50 {
                        handoff.push(p * 100 + i);
                    }
                })
            })
            .collect();

        let mut received: Vec<i32> = (0..200).map(|_| handoff.pop()).collect();
        for producer in producers {
            producer.join().unwrap();
        }

        // Each producer's items keep their relative order.
        for p in 0..4 {
            let own: Vec<_> = received.iter().filter(|v| **v / 100 == p).copied().collect();
            assert_eq!(own, (0..50).map(|i| p * 100 + i).collect::<Vec<_>>());
        }

        received.sort_unstable();
        received.dedup();
        assert_eq!(received.len(), 200);
    }
}
