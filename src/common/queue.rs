//! Command queue between the public API and an execution's dispatcher.

use std::sync::Arc;

use crate::{FlowError, Result};

/// Bounded MPMC queue backed by flume.
///
/// Every message is consumed by exactly one receiver; the dispatcher of an
/// execution is the only consumer of its command queue.
pub struct Queue<T> {
    receiver: flume::Receiver<T>,
    sender: flume::Sender<T>,
}

impl<T> Queue<T> {
    pub fn new(cap: usize) -> Arc<Self> {
        let (sender, receiver) = flume::bounded(cap);
        Arc::new(Self {
            receiver,
            sender,
        })
    }

    /// Enqueue without waiting. Fails when the queue is full or closed.
    pub fn send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.try_send(msg).map_err(|e| FlowError::Queue(e.to_string()))
    }

    pub async fn next_async(&self) -> Option<T> {
        self.receiver.recv_async().await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::Queue;

    #[tokio::test]
    async fn test_queue_fifo() {
        let queue = Queue::new(4);
        queue.send(1).unwrap();
        queue.send(2).unwrap();
        assert_eq!(queue.next_async().await, Some(1));
        assert_eq!(queue.next_async().await, Some(2));
    }

    #[test]
    fn test_queue_full() {
        let queue = Queue::new(1);
        queue.send("a").unwrap();
        assert!(queue.send("b").is_err());
    }
}
