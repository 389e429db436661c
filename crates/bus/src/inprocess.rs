use async_trait::async_trait;
use tokio::sync::broadcast;
use ttsrelay_protocol::BusEnvelope;
use uuid::Uuid;

use crate::{BusSubscription, EventBus, Result};

/// In-process implementation of [`EventBus`] backed by `tokio::sync::broadcast`.
/// Each subscriber gets its own receiver (tagged with a random id purely for
/// log correlation, mirroring the random-suffix subscription naming in §6).
pub struct InProcessBus {
    sender: broadcast::Sender<BusEnvelope>,
}

impl InProcessBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InProcessBus {
    async fn publish(&self, envelope: BusEnvelope) -> Result<()> {
        // No subscribers is not an error: a replica with no active
        // overlay clients simply never re-derives the item.
        let _ = self.sender.send(envelope);
        Ok(())
    }

    fn subscribe(&self) -> Box<dyn BusSubscription> {
        Box::new(InProcessSubscription {
            id: Uuid::new_v4().to_string(),
            receiver: self.sender.subscribe(),
        })
    }
}

struct InProcessSubscription {
    #[allow(dead_code)]
    id: String,
    receiver: broadcast::Receiver<BusEnvelope>,
}

#[async_trait]
impl BusSubscription for InProcessSubscription {
    async fn recv(&mut self) -> Option<BusEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                // A slow subscriber that lagged behind skips to the next
                // available envelope rather than terminating; duplicate
                // delivery is already tolerated by consumers (§4.2).
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
