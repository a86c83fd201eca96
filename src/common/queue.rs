//! Message queues for inter-step communication.
//!
//! Every step inbox, the waiter queue and the streaming sink are a [`Queue`].

use std::sync::Arc;

use crate::{Result, StepflowError};

/// Unbounded MPMC (multi-producer, multi-consumer) FIFO queue.
///
/// Sends never block and never apply backpressure. The queue owns both ends of
/// its channel, so it stays open for as long as the queue itself is alive.
/// Backed by flume for high-performance message passing.
pub struct Queue<T> {
    receiver: flume::Receiver<T>,
    sender: flume::Sender<T>,
}

impl<T> Queue<T> {
    /// create a new queue
    pub fn new() -> Arc<Self> {
        let (tx, rx) = flume::unbounded();

        Arc::new(Self {
            receiver: rx,
            sender: tx,
        })
    }

    /// create a new queue pre-filled with `items`, in order
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Arc<Self> {
        let queue = Self::new();
        for item in items {
            // both ends are owned by the queue, the channel cannot be disconnected here
            let _ = queue.sender.send(item);
        }
        queue
    }

    /// send a message to the queue
    pub fn send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.send(msg).map_err(|e| StepflowError::Queue(e.to_string()))
    }

    /// receive a message if one is immediately available
    pub fn try_next(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// receive a message from the queue asynchronously
    pub async fn next_async(&self) -> Option<T> {
        self.receiver.recv_async().await.ok()
    }

    /// number of queued messages
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<T: Clone> Queue<T> {
    /// Returns the queued messages in FIFO order without consuming them.
    ///
    /// The queue is drained and refilled, so producers must be held off while
    /// this runs. Context snapshots do that through the broker log lock.
    pub fn items(&self) -> Vec<T> {
        let items: Vec<T> = self.receiver.drain().collect();
        for item in &items {
            let _ = self.sender.send(item.clone());
        }
        items
    }
}
