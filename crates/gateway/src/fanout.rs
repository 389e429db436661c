//! Overlay WebSocket connection membership (§4.3). Each registered overlay
//! connection owns an `mpsc::UnboundedSender` fed by this registry; the
//! connection's own write loop (in `ws_handler`) drains it onto the socket,
//! matching the non-blocking-send requirement for fan-out sends.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use ttsrelay_engine::FanOutPort;
use ttsrelay_protocol::OverlayFrame;
use uuid::Uuid;

/// Registry of live overlay connections, keyed by channel login.
#[derive(Clone, Default)]
pub struct FanOutRegistry {
    channels: Arc<DashMap<String, Vec<Connection>>>,
}

#[derive(Clone)]
struct Connection {
    id: Uuid,
    sender: mpsc::UnboundedSender<OverlayFrame>,
}

impl FanOutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new overlay connection for `channel`; returns its id and
    /// the receiving half the connection's write loop should drain.
    pub fn register(&self, channel: &str) -> (Uuid, mpsc::UnboundedReceiver<OverlayFrame>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push(Connection { id, sender: tx });
        (id, rx)
    }

    /// Drop a connection on disconnect. Removes the channel entry entirely
    /// once its last connection is gone.
    pub fn unregister(&self, channel: &str, id: Uuid) {
        if let Some(mut conns) = self.channels.get_mut(channel) {
            conns.retain(|c| c.id != id);
            if conns.is_empty() {
                drop(conns);
                self.channels.remove(channel);
            }
        }
    }
}

impl FanOutPort for FanOutRegistry {
    fn has_active_clients(&self, channel: &str) -> bool {
        self.channels.get(channel).map(|conns| !conns.is_empty()).unwrap_or(false)
    }

    fn send_audio(&self, channel: &str, frame: OverlayFrame) {
        let Some(conns) = self.channels.get(channel) else {
            return;
        };
        for conn in conns.iter() {
            // Non-blocking: a dropped receiver (connection already gone) is
            // cleaned up by the write loop's own disconnect path, not here.
            let _ = conn.sender.send(frame.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_with_no_connections_has_no_active_clients() {
        let registry = FanOutRegistry::new();
        assert!(!registry.has_active_clients("alice"));
    }

    #[test]
    fn registered_connection_is_reported_active() {
        let registry = FanOutRegistry::new();
        let (_id, _rx) = registry.register("alice");
        assert!(registry.has_active_clients("alice"));
    }

    #[test]
    fn unregistering_last_connection_clears_active_state() {
        let registry = FanOutRegistry::new();
        let (id, _rx) = registry.register("alice");
        registry.unregister("alice", id);
        assert!(!registry.has_active_clients("alice"));
    }

    #[tokio::test]
    async fn send_audio_delivers_to_every_registered_connection_on_the_channel() {
        let registry = FanOutRegistry::new();
        let (_id_a, mut rx_a) = registry.register("alice");
        let (_id_b, mut rx_b) = registry.register("alice");

        registry.send_audio("alice", OverlayFrame::PlayAudio { url: "https://x/y.mp3".into() });

        assert_eq!(rx_a.recv().await, Some(OverlayFrame::PlayAudio { url: "https://x/y.mp3".into() }));
        assert_eq!(rx_b.recv().await, Some(OverlayFrame::PlayAudio { url: "https://x/y.mp3".into() }));
    }

    #[tokio::test]
    async fn send_audio_to_an_unregistered_channel_is_a_no_op() {
        let registry = FanOutRegistry::new();
        registry.send_audio("nobody", OverlayFrame::StopAudio);
    }
}
