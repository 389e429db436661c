use serde::{Deserialize, Serialize};

use crate::voice::VoiceParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemType {
    Chat,
    Command,
    CheerTts,
    Event,
    Reward,
}

/// A shared-chat session descriptor attached to a work item, so the engine
/// knows to dispatch the resulting audio to every participant channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedSessionRef {
    pub session_id: String,
    pub participant_channels: Vec<String>,
}

/// A unit of work queued per-channel for synthesis (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsWorkItem {
    pub text: String,
    pub speaker: String,
    pub item_type: WorkItemType,
    pub voice: VoiceParams,
    /// Milliseconds since epoch; monotonic per process for ordering purposes.
    pub enqueued_at_ms: u64,
    pub shared_session: Option<SharedSessionRef>,
}

impl TtsWorkItem {
    pub fn new(
        text: impl Into<String>,
        speaker: impl Into<String>,
        item_type: WorkItemType,
        voice: VoiceParams,
        enqueued_at_ms: u64,
    ) -> Self {
        Self {
            text: text.into(),
            speaker: speaker.into(),
            item_type,
            voice,
            enqueued_at_ms,
            shared_session: None,
        }
    }

    pub fn with_shared_session(mut self, session: SharedSessionRef) -> Self {
        self.shared_session = Some(session);
        self
    }
}
