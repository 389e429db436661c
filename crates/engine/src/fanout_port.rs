use ttsrelay_protocol::OverlayFrame;

/// The engine's view of the fan-out server (§4.3, §9 "cyclic ownership"
/// note). A pure query plus a non-blocking send, with no behavioral
/// coupling back into the engine.
pub trait FanOutPort: Send + Sync {
    fn has_active_clients(&self, channel: &str) -> bool;
    fn send_audio(&self, channel: &str, frame: OverlayFrame);
}
