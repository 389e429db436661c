//! Shared-chat session registry (§3): session-id to participant channels,
//! plus the reverse index used to attach a [`SharedSessionRef`] to every
//! work item enqueued while a session is active.

use std::collections::HashMap;

use ttsrelay_protocol::SharedSessionRef;

#[derive(Debug, Clone, Default)]
struct Session {
    participant_channels: Vec<String>,
}

/// In-memory registry, reconstructed from live events as they arrive
/// (§3: "session state owned by the process and reconstructed from live
/// events").
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    channel_to_session: HashMap<String, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, session_id: &str, participant_channels: Vec<String>) {
        for channel in &participant_channels {
            self.channel_to_session
                .insert(channel.clone(), session_id.to_string());
        }
        self.sessions.insert(
            session_id.to_string(),
            Session { participant_channels },
        );
    }

    pub fn update(&mut self, session_id: &str, participant_channels: Vec<String>) {
        if let Some(previous) = self.sessions.get(session_id) {
            for channel in &previous.participant_channels {
                self.channel_to_session.remove(channel);
            }
        }
        self.begin(session_id, participant_channels);
    }

    pub fn end(&mut self, session_id: &str) {
        if let Some(session) = self.sessions.remove(session_id) {
            for channel in session.participant_channels {
                self.channel_to_session.remove(&channel);
            }
        }
    }

    /// Look up the session covering `channel`, if the channel is currently
    /// part of one, as a [`SharedSessionRef`] ready to attach to a work item.
    pub fn session_for_channel(&self, channel: &str) -> Option<SharedSessionRef> {
        let session_id = self.channel_to_session.get(channel)?;
        let session = self.sessions.get(session_id)?;
        Some(SharedSessionRef {
            session_id: session_id.clone(),
            participant_channels: session.participant_channels.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_populates_reverse_index() {
        let mut reg = SessionRegistry::new();
        reg.begin("s1", vec!["a".to_string(), "b".to_string()]);
        let session = reg.session_for_channel("a").unwrap();
        assert_eq!(session.session_id, "s1");
        assert_eq!(session.participant_channels, vec!["a", "b"]);
        assert_eq!(reg.session_for_channel("b").unwrap().session_id, "s1");
    }

    #[test]
    fn update_replaces_participant_set() {
        let mut reg = SessionRegistry::new();
        reg.begin("s1", vec!["a".to_string(), "b".to_string()]);
        reg.update("s1", vec!["a".to_string(), "c".to_string()]);
        assert!(reg.session_for_channel("b").is_none());
        assert!(reg.session_for_channel("c").is_some());
    }

    #[test]
    fn end_clears_all_participants() {
        let mut reg = SessionRegistry::new();
        reg.begin("s1", vec!["a".to_string(), "b".to_string()]);
        reg.end("s1");
        assert!(reg.session_for_channel("a").is_none());
        assert!(reg.session_for_channel("b").is_none());
    }

    #[test]
    fn unknown_channel_has_no_session() {
        let reg = SessionRegistry::new();
        assert!(reg.session_for_channel("nowhere").is_none());
    }
}
