//! Cross-instance bus consumer (§4.2, §6): every replica subscribes
//! independently and re-derives the engine's local per-channel queue from
//! whatever envelopes arrive, including the ones this same replica just
//! published from the webhook handler or the chat pipeline.

use std::sync::Arc;

use ttsrelay_bus::EventBus;
use ttsrelay_engine::Engine;

pub fn spawn(bus: Arc<dyn EventBus>, engine: Arc<Engine>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut subscription = bus.subscribe();
        while let Some(envelope) = subscription.recv().await {
            engine.enqueue(&envelope.channel, envelope.item);
        }
    })
}
