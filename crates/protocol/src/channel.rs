use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::voice::VoiceOverride;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    All,
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionGate {
    Everyone,
    Mods,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BitsGate {
    pub enabled: bool,
    pub minimum_amount: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPolicy {
    pub banned_words: Vec<String>,
    pub block_links: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardBinding {
    pub reward_id: String,
    pub enabled: bool,
    pub content_policy: ContentPolicy,
}

/// Per-channel configuration, keyed by lowercase channel login (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub login: String,
    pub engine_enabled: bool,
    pub read_mode: ReadMode,
    pub permission_gate: PermissionGate,
    pub event_speech: bool,
    pub bits_gate: BitsGate,
    pub default_voice: VoiceOverride,
    pub ignored_users: HashSet<String>,
    pub reward_binding: Option<RewardBinding>,
    pub honor_viewer_prefs: bool,
    /// Read but, per the recorded open question, not writable through any
    /// endpoint in this surface.
    pub read_full_urls: bool,
}

impl Channel {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into().to_lowercase(),
            engine_enabled: false,
            read_mode: ReadMode::Command,
            permission_gate: PermissionGate::Mods,
            event_speech: false,
            bits_gate: BitsGate::default(),
            default_voice: VoiceOverride::default(),
            ignored_users: HashSet::new(),
            reward_binding: None,
            honor_viewer_prefs: true,
            read_full_urls: false,
        }
    }

    pub fn is_ignored(&self, username: &str) -> bool {
        self.ignored_users.contains(&username.to_lowercase())
    }
}
