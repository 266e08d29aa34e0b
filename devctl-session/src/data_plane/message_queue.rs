//! Unbounded FIFO mailbox with a close sentinel.

use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

enum Slot<T> {
    Item(T),
    Sentinel,
}

/// Result of [`MessageQueue::pop`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Popped<T> {
    Item(T),
    /// The sentinel was popped. The consumer must stop and must not re-push it.
    Closed,
    Timeout,
}

/// Ordered, thread-safe mailbox.
///
/// Any number of producers may push concurrently. Consumers are serialized on the
/// receiving half; sessions use exactly one consumer per queue.
pub struct MessageQueue<T> {
    tx: mpsc::UnboundedSender<Slot<T>>,
    rx: Mutex<mpsc::UnboundedReceiver<Slot<T>>>,
}

impl<T: Send> MessageQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn push(&self, item: T) {
        // The queue owns its receiver, so the channel cannot be disconnected here.
        let _ = self.tx.send(Slot::Item(item));
    }

    /// Pushes the sentinel. Items pushed before it are still delivered first.
    pub fn close(&self) {
        let _ = self.tx.send(Slot::Sentinel);
    }

    /// Waits up to `timeout` (forever when `None`) for the next item.
    pub async fn pop(&self, timeout: Option<Duration>) -> Popped<T> {
        let next = async {
            let mut rx = self.rx.lock().await;
            match rx.recv().await {
                Some(Slot::Item(item)) => Popped::Item(item),
                Some(Slot::Sentinel) | None => Popped::Closed,
            }
        };

        match timeout {
            None => next.await,
            Some(timeout) => tokio::time::timeout(timeout, next)
                .await
                .unwrap_or(Popped::Timeout),
        }
    }

    /// Discards everything currently queued without waiting. Returns the number of items
    /// dropped; sentinels are not counted.
    pub async fn drain(&self) -> usize {
        let mut rx = self.rx.lock().await;
        let mut discarded = 0;
        while let Ok(slot) = rx.try_recv() {
            if let Slot::Item(_) = slot {
                discarded += 1;
            }
        }
        discarded
    }
}

impl<T: Send> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{MessageQueue, Popped};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn pop_is_fifo() {
        let queue = MessageQueue::new();
        for i in 0..5 {
            queue.push(i);
        }

        for i in 0..5 {
            assert_eq!(queue.pop(None).await, Popped::Item(i));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pop_returns_timeout_instead_of_blocking() {
        let queue: MessageQueue<u32> = MessageQueue::new();
        assert_eq!(
            queue.pop(Some(Duration::from_millis(50))).await,
            Popped::Timeout
        );

        queue.push(7);
        assert_eq!(
            queue.pop(Some(Duration::from_millis(50))).await,
            Popped::Item(7)
        );
    }

    #[tokio::test]
    async fn sentinel_is_delivered_after_earlier_items_and_only_once() {
        let queue = MessageQueue::new();
        queue.push("a");
        queue.close();
        queue.push("b");

        assert_eq!(queue.pop(None).await, Popped::Item("a"));
        assert_eq!(queue.pop(None).await, Popped::Closed);
        // The sentinel is consumed, not re-delivered.
        assert_eq!(queue.pop(None).await, Popped::Item("b"));
    }

    #[tokio::test]
    async fn drain_counts_items_but_not_sentinels() {
        let queue = MessageQueue::new();
        queue.push(1);
        queue.push(2);
        queue.close();
        queue.push(3);

        assert_eq!(queue.drain().await, 3);
        assert_eq!(queue.drain().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_keep_per_producer_order() {
        let queue = Arc::new(MessageQueue::new());
        let producers: Vec<_> = (0..4u32)
            .map(|producer| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    for seq in 0..100u32 {
                        queue.push((producer, seq));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.expect("producer task");
        }

        let mut last_seen = [None::<u32>; 4];
        for _ in 0..400 {
            let Popped::Item((producer, seq)) = queue.pop(None).await else {
                panic!("expected an item");
            };
            if let Some(previous) = last_seen[producer as usize] {
                assert!(seq > previous);
            }
            last_seen[producer as usize] = Some(seq);
        }
        assert_eq!(queue.drain().await, 0);
    }
}
