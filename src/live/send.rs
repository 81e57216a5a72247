//! Outbound send queues and their drain workers.
//!
//! Two independent unbounded FIFO queues, one for text and one for binary
//! messages, each drained by a dedicated worker task. Every individual send
//! happens under the client's shared lock, so queued sends interleave safely
//! with instant sends and reconnection but never with each other mid-frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{error, trace, warn};

use crate::live::client::ClientInner;

/// The pair of outbound queues for one client.
pub(crate) struct SendQueue {
    text_tx: RwLock<Option<UnboundedSender<String>>>,
    binary_tx: RwLock<Option<UnboundedSender<Vec<u8>>>>,
    text_rx: Arc<Mutex<UnboundedReceiver<String>>>,
    binary_rx: Arc<Mutex<UnboundedReceiver<Vec<u8>>>>,
    workers_started: AtomicBool,
}

impl SendQueue {
    pub(crate) fn new() -> Self {
        let (text_tx, text_rx) = mpsc::unbounded_channel();
        let (binary_tx, binary_rx) = mpsc::unbounded_channel();
        Self {
            text_tx: RwLock::new(Some(text_tx)),
            binary_tx: RwLock::new(Some(binary_tx)),
            text_rx: Arc::new(Mutex::new(text_rx)),
            binary_rx: Arc::new(Mutex::new(binary_rx)),
            workers_started: AtomicBool::new(false),
        }
    }

    /// Enqueues a text message; returns false once the queue is closed.
    pub(crate) fn enqueue_text(&self, message: String) -> bool {
        match self.text_tx.read().as_ref() {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    /// Enqueues a binary message; returns false once the queue is closed.
    pub(crate) fn enqueue_binary(&self, message: Vec<u8>) -> bool {
        match self.binary_tx.read().as_ref() {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    /// Closes both queues. Workers drain what is left and exit.
    pub(crate) fn close(&self) {
        self.text_tx.write().take();
        self.binary_tx.write().take();
    }

    /// Spawns the two drain workers, once per client lifetime.
    pub(crate) fn start_workers(&self, inner: &Arc<ClientInner>) {
        if self
            .workers_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        supervise(inner, "text", |inner| drain_text(inner));
        supervise(inner, "binary", |inner| drain_binary(inner));
    }
}

/// Runs a drain worker and respawns it when it dies for a reason unrelated
/// to shutdown.
fn supervise<F, Fut>(inner: &Arc<ClientInner>, queue: &'static str, drain: F)
where
    F: Fn(Arc<ClientInner>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        loop {
            let worker = tokio::spawn(drain(Arc::clone(&inner)));
            match worker.await {
                Ok(()) => break,
                Err(e) => {
                    if inner.is_disposed() {
                        break;
                    }
                    warn!(
                        client = %inner.config.name,
                        queue,
                        error = %e,
                        "send worker terminated unexpectedly, spawning a replacement"
                    );
                }
            }
        }
    });
}

async fn drain_text(inner: Arc<ClientInner>) {
    let rx = Arc::clone(&inner.queue.text_rx);
    let mut rx = rx.lock().await;
    while let Some(message) = rx.recv().await {
        trace!(client = %inner.config.name, len = message.len(), "draining queued text message");
        if let Err(e) = inner.send_text_synchronized(&message).await {
            error!(
                client = %inner.config.name,
                error = %e,
                "failed to send queued text message"
            );
        }
    }
}

async fn drain_binary(inner: Arc<ClientInner>) {
    let rx = Arc::clone(&inner.queue.binary_rx);
    let mut rx = rx.lock().await;
    while let Some(message) = rx.recv().await {
        trace!(client = %inner.config.name, len = message.len(), "draining queued binary message");
        if let Err(e) = inner.send_binary_synchronized(&message).await {
            error!(
                client = %inner.config.name,
                error = %e,
                "failed to send queued binary message"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_close() {
        let queue = SendQueue::new();
        assert!(queue.enqueue_text("a".to_string()));
        assert!(queue.enqueue_binary(vec![1, 2]));

        queue.close();
        assert!(!queue.enqueue_text("b".to_string()));
        assert!(!queue.enqueue_binary(vec![3]));
    }

    #[tokio::test]
    async fn test_closed_queue_still_drains_backlog() {
        let queue = SendQueue::new();
        assert!(queue.enqueue_text("a".to_string()));
        assert!(queue.enqueue_text("b".to_string()));
        queue.close();

        let mut rx = queue.text_rx.lock().await;
        assert_eq!(rx.recv().await, Some("a".to_string()));
        assert_eq!(rx.recv().await, Some("b".to_string()));
        assert_eq!(rx.recv().await, None);
    }
}
