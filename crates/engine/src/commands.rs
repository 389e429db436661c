use tokio::sync::oneshot;
use ttsrelay_protocol::TtsWorkItem;

/// Messages accepted by a channel's worker mailbox. `Enqueue` returns
/// synchronously from the caller's perspective (§4.1 contract) — the send
/// into the mailbox is itself non-blocking, which satisfies that contract.
pub enum EngineCommand {
    Enqueue(TtsWorkItem),
    Pause,
    Resume,
    Clear,
    /// `requester` is the speaker tag attempting the stop; `is_moderator`
    /// grants stop authority irrespective of speaker identity (§4.1).
    StopCurrent {
        requester: String,
        is_moderator: bool,
        reply: oneshot::Sender<bool>,
    },
    /// Drain the pending (non-in-flight) items for shutdown persistence.
    Snapshot {
        reply: oneshot::Sender<ttsrelay_store::QueueSnapshot>,
    },
}
