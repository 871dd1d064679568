use super::{Job, Queue, QueueError, QueueErrorKind};
use tokio::sync::mpsc;

/// In-process queue backed by a bounded `tokio::sync::mpsc` channel.
/// Stands in for the message bus a real deployment
/// would front this crate with (Kafka, Pulsar, ...), whose wire protocol is
/// explicitly out of scope.
#[derive(Clone)]
pub struct ChannelQueue {
    sender: mpsc::Sender<Job>,
}

impl ChannelQueue {
    /// Build a queue and its matching receiver. The receiver is handed to a
    /// [`crate::worker::Worker`]; dropping it without ever consuming causes
    /// subsequent `publish` calls to fail with [`QueueErrorKind::Closed`].
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (ChannelQueue { sender }, receiver)
    }
}

impl Queue for ChannelQueue {
    async fn publish(&self, job: Job) -> Result<(), QueueError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| QueueError { kind: QueueErrorKind::Closed })
    }
}
