//! Shared handle for one producer and one consumer

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::{RingBuffer, RingBufferError};

struct Shared<T> {
    buffer: Mutex<RingBuffer<T>>,
    available: Notify,
}

/// Cloneable handle over a [`RingBuffer`] guarded by a mutex
///
/// Every operation is atomic with respect to the others. The consumer can
/// park on [`SharedRingBuffer::wait_for_data`] instead of polling.
pub struct SharedRingBuffer<T> {
    inner: Arc<Shared<T>>,
}

impl<T> Clone for SharedRingBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedRingBuffer<T> {
    pub fn new(capacity: usize, overwrite: bool) -> Self {
        Self {
            inner: Arc::new(Shared {
                buffer: Mutex::new(RingBuffer::with_overwrite(capacity, overwrite)),
                available: Notify::new(),
            }),
        }
    }

    // A panic while holding the lock cannot leave the counters half-updated,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, RingBuffer<T>> {
        self.inner
            .buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add an item and wake a waiting consumer
    pub fn add(&self, item: T) -> Result<Option<T>, RingBufferError> {
        let result = self.lock().add(item);
        if result.is_ok() {
            self.inner.available.notify_one();
        }
        result
    }

    pub fn remove(&self) -> Result<T, RingBufferError> {
        self.lock().remove()
    }

    /// Remove every buffered item, oldest first
    pub fn drain(&self) -> Vec<T> {
        let mut buffer = self.lock();
        let mut items = Vec::with_capacity(buffer.size());
        while let Ok(item) = buffer.remove() {
            items.push(item);
        }
        items
    }

    pub fn size(&self) -> usize {
        self.lock().size()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    pub fn set_overwrite(&self, overwrite: bool) {
        self.lock().set_overwrite(overwrite);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Wait until at least one item is buffered
    ///
    /// Returns immediately if the buffer is already non-empty.
    pub async fn wait_for_data(&self) {
        loop {
            let notified = self.inner.available.notified();
            if self.lock().is_not_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Wake a waiting consumer without adding data
    pub fn wake(&self) {
        self.inner.available.notify_one();
    }
}

impl<T: Clone> SharedRingBuffer<T> {
    /// Copy the newest `count` items, oldest first
    pub fn latest(&self, count: usize) -> Vec<T> {
        self.lock().latest(count)
    }

    pub fn peek(&self) -> Result<T, RingBufferError> {
        self.lock().peek().cloned()
    }

    pub fn newest(&self) -> Result<T, RingBufferError> {
        self.lock().newest().cloned()
    }
}

impl<T> std::fmt::Debug for SharedRingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let buffer = self.lock();
        f.debug_struct("SharedRingBuffer")
            .field("size", &buffer.size())
            .field("capacity", &buffer.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_for_data_returns_when_non_empty() {
        let buffer = SharedRingBuffer::new(4, false);
        buffer.add(1u32).unwrap();
        tokio::time::timeout(Duration::from_millis(100), buffer.wait_for_data())
            .await
            .expect("buffer already holds data");
    }

    #[tokio::test]
    async fn test_wait_for_data_wakes_on_add() {
        let buffer = SharedRingBuffer::new(4, false);
        let producer = buffer.clone();

        let waiter = tokio::spawn(async move {
            buffer.wait_for_data().await;
            buffer.remove()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        producer.add(99u32).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("consumer woke up")
            .unwrap();
        assert_eq!(result, Ok(99));
    }

    #[test]
    fn test_drain_returns_in_order() {
        let buffer = SharedRingBuffer::new(3, true);
        for i in 0..5u32 {
            buffer.add(i).unwrap();
        }
        assert_eq!(buffer.drain(), vec![2, 3, 4]);
        assert!(buffer.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_producer_consumer() {
        const TOTAL: u64 = 10_000;
        let buffer = SharedRingBuffer::new(16, true);
        let producer = buffer.clone();

        let producer_task = tokio::spawn(async move {
            let mut evicted = 0u64;
            for i in 0..TOTAL {
                if let Ok(Some(_)) = producer.add(i) {
                    evicted += 1;
                }
                if i % 64 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            evicted
        });

        let consumer = buffer.clone();
        let consumer_task = tokio::spawn(async move {
            let mut received = Vec::new();
            loop {
                match consumer.remove() {
                    Ok(item) => {
                        let done = item == TOTAL - 1;
                        received.push(item);
                        if done {
                            break;
                        }
                    }
                    Err(_) => consumer.wait_for_data().await,
                }
            }
            received
        });

        let (evicted, received) = tokio::time::timeout(Duration::from_secs(10), async {
            (producer_task.await.unwrap(), consumer_task.await.unwrap())
        })
        .await
        .expect("no deadlock");

        assert_eq!(received.len() as u64 + evicted, TOTAL);
        assert!(received.windows(2).all(|w| w[0] < w[1]));
    }
}
