//! In-process metric transport backed by a tokio mpsc channel

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Reading;

use super::{MetricTransport, TransportError, TransportResult};

/// Creates a connected publisher/transport pair holding up to `capacity`
/// pending readings.
pub fn channel(capacity: usize) -> (ChannelPublisher, ChannelTransport) {
    let (sender, receiver) = mpsc::channel(capacity);
    (ChannelPublisher { sender }, ChannelTransport { receiver })
}

/// Producer side of an in-process transport
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<Reading>,
}

impl ChannelPublisher {
    /// Queues a reading, waiting while the channel is full.
    pub async fn publish(&self, reading: Reading) -> TransportResult<()> {
        self.sender
            .send(reading)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// Consumer side of an in-process transport
///
/// Reports [`TransportError::Closed`] once every publisher is gone and the
/// queue is drained.
#[derive(Debug)]
pub struct ChannelTransport {
    receiver: mpsc::Receiver<Reading>,
}

#[async_trait]
impl MetricTransport for ChannelTransport {
    async fn receive(&mut self) -> TransportResult<Reading> {
        self.receiver.recv().await.ok_or(TransportError::Closed)
    }
}
