use std::collections::VecDeque;

use tokio_util::sync::CancellationToken;
use ttsrelay_protocol::{TtsWorkItem, QUEUE_CAP};
use ttsrelay_store::QueueSnapshot;

/// Per-channel queue state (§3), mutated only by that channel's own worker
/// task — an actor mailbox, per §5's shared-resource rule.
pub struct ChannelQueueState {
    pub items: VecDeque<TtsWorkItem>,
    pub paused: bool,
    pub processing_now: bool,
    pub current_token: Option<CancellationToken>,
    pub current_playback_url: Option<String>,
    pub current_speaker: Option<String>,
}

impl ChannelQueueState {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
            paused: false,
            processing_now: false,
            current_token: None,
            current_playback_url: None,
            current_speaker: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= QUEUE_CAP
    }

    pub fn snapshot_pending(&self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.items.iter().cloned().collect(),
            paused: self.paused,
        }
    }

    pub fn restore(&mut self, snapshot: QueueSnapshot) {
        self.items = snapshot.items.into_iter().collect();
        self.paused = snapshot.paused;
    }
}

impl Default for ChannelQueueState {
    fn default() -> Self {
        Self::new()
    }
}
