//! Bounded-coordination task queue for the worker pool.
//!
//! Tracks "unfinished" work separately from queue length: an item popped but
//! not yet acknowledged with [`TaskQueue::task_done`] still counts, so
//! [`TaskQueue::join`] only resolves once every pushed item has been fully
//! processed, not merely dequeued.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

pub struct TaskQueue<T> {
    items: Mutex<VecDeque<T>>,
    unfinished: AtomicUsize,
    notify_push: Notify,
    notify_done: Notify,
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            unfinished: AtomicUsize::new(0),
            notify_push: Notify::new(),
            notify_done: Notify::new(),
        }
    }

    pub fn push(&self, item: T) {
        {
            let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
            items.push_back(item);
        }
        self.unfinished.fetch_add(1, Ordering::SeqCst);
        self.notify_push.notify_one();
    }

    /// Pops the next item, waiting up to `timeout` for one to arrive.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(item) = items.pop_front() {
                    return Some(item);
                }
            }
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .unwrap_or(Duration::ZERO);
            if remaining.is_zero() {
                return None;
            }
            let _ = tokio::time::timeout(remaining, self.notify_push.notified()).await;
        }
    }

    /// Acknowledges one previously popped item.
    pub fn task_done(&self) {
        let previous = self.unfinished.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "task_done without a matching push");
        if previous == 1 {
            self.notify_done.notify_waiters();
        }
    }

    /// Resolves once every pushed item has been acknowledged.
    pub async fn join(&self) {
        loop {
            if self.unfinished.load(Ordering::SeqCst) == 0 {
                return;
            }
            let notified = self.notify_done.notified();
            // Re-check after registering, the last ack may have raced us.
            if self.unfinished.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::SeqCst)
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn pop_returns_items_in_fifo_order() {
        let queue = TaskQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.pop_timeout(Duration::from_millis(10)).await, Some(1));
        assert_eq!(queue.pop_timeout(Duration::from_millis(10)).await, Some(2));
        assert_eq!(queue.pop_timeout(Duration::from_millis(10)).await, Some(3));
        assert_eq!(queue.pop_timeout(Duration::from_millis(10)).await, None);
    }

    #[tokio::test]
    async fn join_waits_for_acknowledgement_not_just_dequeue() {
        let queue = Arc::new(TaskQueue::new());
        queue.push("a");

        let popped = queue.pop_timeout(Duration::from_millis(10)).await;
        assert_eq!(popped, Some("a"));
        assert_eq!(queue.unfinished(), 1);

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.join().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.task_done();
        waiter.await.unwrap();
        assert_eq!(queue.unfinished(), 0);
    }

    #[tokio::test]
    async fn pop_timeout_wakes_on_concurrent_push() {
        let queue = Arc::new(TaskQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop_timeout(Duration::from_secs(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(42);
        assert_eq!(consumer.await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn join_resolves_immediately_when_nothing_was_pushed() {
        let queue: TaskQueue<u8> = TaskQueue::new();
        queue.join().await;
    }
}
