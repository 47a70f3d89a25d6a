//! Bounded PCM chunk queue
//!
//! Single-producer/single-consumer queue between a decode worker and the mix
//! loop. Provides both data transfer and backpressure: `push` parks the
//! producer while the queue is at capacity, `take` parks the consumer while
//! it is empty and the stream has not ended.
//!
//! Two ways for a stream to end:
//! - `finish()`: natural end of input; chunks already queued remain takeable.
//! - `close()`: stop requested; the queue is cleared and both sides unblock.

use crate::decode::PcmChunk;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::trace;

pub struct ChunkQueue {
    inner: Mutex<VecDeque<PcmChunk>>,
    capacity: usize,
    end_of_stream: AtomicBool,
    /// Woken when a chunk arrives or the stream ends
    data_ready: Notify,
    /// Woken when a slot frees up or the queue is closed
    space_ready: Notify,
}

impl ChunkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            end_of_stream: AtomicBool::new(false),
            data_ready: Notify::new(),
            space_ready: Notify::new(),
        }
    }

    /// Push one chunk, waiting while the queue is at capacity.
    ///
    /// Returns false if the queue has been ended; the producer should stop
    /// decoding. Chunks pushed after `close()` are discarded.
    pub async fn push(&self, chunk: PcmChunk) -> bool {
        loop {
            {
                let mut queue = self.inner.lock().unwrap();
                if self.end_of_stream.load(Ordering::Acquire) {
                    return false;
                }
                if queue.len() < self.capacity {
                    queue.push_back(chunk);
                    trace!("queued chunk ({} buffered)", queue.len());
                    self.data_ready.notify_one();
                    return true;
                }
            }
            // Queue full: wait for the consumer to drain a slot
            self.space_ready.notified().await;
        }
    }

    /// Take the next chunk, waiting while the queue is empty and the stream
    /// has not ended. Returns None only once the stream has ended *and* the
    /// queue is drained; that is the definitive completion signal.
    pub async fn take(&self) -> Option<PcmChunk> {
        loop {
            {
                let mut queue = self.inner.lock().unwrap();
                if let Some(chunk) = queue.pop_front() {
                    self.space_ready.notify_one();
                    return Some(chunk);
                }
                if self.end_of_stream.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.data_ready.notified().await;
        }
    }

    /// Mark natural end of input. Queued chunks remain takeable.
    pub fn finish(&self) {
        self.end_of_stream.store(true, Ordering::Release);
        self.data_ready.notify_one();
        self.space_ready.notify_one();
    }

    /// End the stream immediately: clear all queued chunks and unblock both
    /// sides. Used by stop, which must release a producer parked on a full
    /// queue.
    pub fn close(&self) {
        {
            let mut queue = self.inner.lock().unwrap();
            queue.clear();
        }
        self.end_of_stream.store(true, Ordering::Release);
        self.data_ready.notify_one();
        self.space_ready.notify_one();
    }

    /// True once the stream has ended (naturally or via `close`), regardless
    /// of whether chunks are still queued.
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream.load(Ordering::Acquire)
    }

    /// Number of chunks currently buffered.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = ChunkQueue::new(5);
        assert!(queue.push(vec![1, 0]).await);
        assert!(queue.push(vec![2, 0]).await);
        assert!(queue.push(vec![3, 0]).await);

        assert_eq!(queue.take().await, Some(vec![1, 0]));
        assert_eq!(queue.take().await, Some(vec![2, 0]));
        assert_eq!(queue.take().await, Some(vec![3, 0]));
    }

    #[tokio::test]
    async fn test_push_blocks_at_capacity() {
        let queue = Arc::new(ChunkQueue::new(2));
        assert!(queue.push(vec![0, 0]).await);
        assert!(queue.push(vec![0, 0]).await);

        // Third push must park until a slot frees
        let blocked = timeout(Duration::from_millis(50), queue.push(vec![0, 0])).await;
        assert!(blocked.is_err(), "push should block on a full queue");

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.push(vec![9, 9]).await })
        };

        assert!(queue.take().await.is_some());
        assert!(producer.await.unwrap(), "push should complete after drain");
    }

    #[tokio::test]
    async fn test_take_blocks_until_data() {
        let queue = Arc::new(ChunkQueue::new(5));

        let blocked = timeout(Duration::from_millis(50), queue.take()).await;
        assert!(blocked.is_err(), "take should block on an empty open queue");

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.take().await })
        };
        assert!(queue.push(vec![7, 7]).await);
        assert_eq!(consumer.await.unwrap(), Some(vec![7, 7]));
    }

    #[tokio::test]
    async fn test_finish_retains_queued_chunks() {
        let queue = ChunkQueue::new(5);
        assert!(queue.push(vec![1, 1]).await);
        assert!(queue.push(vec![2, 2]).await);
        queue.finish();

        assert!(queue.is_end_of_stream());
        assert_eq!(queue.take().await, Some(vec![1, 1]));
        assert_eq!(queue.take().await, Some(vec![2, 2]));
        assert_eq!(queue.take().await, None);
    }

    #[tokio::test]
    async fn test_close_clears_and_unblocks_producer() {
        let queue = Arc::new(ChunkQueue::new(1));
        assert!(queue.push(vec![0, 0]).await);

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.push(vec![1, 1]).await })
        };
        // Let the producer park on the full queue first
        tokio::time::sleep(Duration::from_millis(20)).await;

        queue.close();
        assert!(!producer.await.unwrap(), "close must release a parked producer");
        assert!(queue.is_end_of_stream());
        assert!(queue.is_empty());
        assert_eq!(queue.take().await, None);
    }

    #[tokio::test]
    async fn test_push_after_end_is_rejected() {
        let queue = ChunkQueue::new(5);
        queue.finish();
        assert!(!queue.push(vec![1, 1]).await);
        assert!(queue.is_empty());
    }
}
