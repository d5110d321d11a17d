use crate::payments::types::Payment;
use crate::queue::{PaymentQueue, QueueError};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock};

/// Bounded in-process queue over a tokio mpsc channel.
///
/// The sender lives behind an `RwLock<Option<_>>` and is dropped on
/// `close`, which lets buffered payments drain and then terminates every
/// receiver. Workers compete for elements through a shared async mutex
/// around the receiving half.
pub struct InMemoryQueue {
    sender: RwLock<Option<mpsc::Sender<Payment>>>,
    receiver: Mutex<mpsc::Receiver<Payment>>,
}

impl InMemoryQueue {
    pub fn new(buffer_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self {
            sender: RwLock::new(Some(sender)),
            receiver: Mutex::new(receiver),
        }
    }
}

#[async_trait]
impl PaymentQueue for InMemoryQueue {
    async fn send(&self, payment: Payment) -> Result<(), QueueError> {
        let sender = self.sender.read().await;
        match sender.as_ref() {
            None => Err(QueueError::Closed),
            Some(sender) => sender.try_send(payment).map_err(|err| match err {
                TrySendError::Full(_) => QueueError::Full,
                TrySendError::Closed(_) => QueueError::Closed,
            }),
        }
    }

    async fn recv(&self) -> Option<Payment> {
        self.receiver.lock().await.recv().await
    }

    async fn close(&self) {
        self.sender.write().await.take();
    }
}
