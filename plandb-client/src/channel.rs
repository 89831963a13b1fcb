use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChannelError;
use shared::message::BusMessage;

/// Outbound path to remote systems
///
/// Resolving a logical system name to an endpoint is the implementation's
/// concern. Inbound traffic is fed to
/// [`SyncController::on_message`](crate::SyncController::on_message) by
/// whatever owns the receiving side.
#[async_trait]
pub trait Channel: Send + Sync + std::fmt::Debug {
    async fn send(&self, target: &str, msg: BusMessage) -> Result<(), ChannelError>;
}

/// Message handed to a [`MemoryChannel`]
#[derive(Debug, Clone)]
pub struct Outbound {
    pub target: String,
    pub message: BusMessage,
}

/// In-memory channel
///
/// Outbound messages are queued on an mpsc channel; the receiving half plays
/// the role of the remote system (or of a test asserting on traffic).
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl MemoryChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn send(&self, target: &str, msg: BusMessage) -> Result<(), ChannelError> {
        self.tx
            .send(Outbound {
                target: target.to_string(),
                message: msg.with_target(target),
            })
            .map_err(|_| ChannelError::Closed)
    }
}
