//! Channel-points redemption state machine (§3, §4.4).

use std::{sync::Arc, time::Duration};

use secrecy::Secret;
use ttsrelay_protocol::{
    ContentPolicy, SharedSessionRef, TtsWorkItem, VoiceParams, WorkItemType,
    REDEMPTION_PENDING_TTL_SECS,
};
use ttsrelay_store::TtlCache;

use crate::{platform_api::PlatformApi, text_transform::substitute_urls};

/// Status Twitch reports on an `add`/`update` redemption event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionStatus {
    Unfulfilled,
    Fulfilled,
    Canceled,
}

/// A raw redemption event as received from the webhook notification-type
/// dispatch (§4.2).
#[derive(Debug, Clone)]
pub struct RedemptionEvent {
    pub redemption_id: String,
    pub channel: String,
    pub reward_id: String,
    pub broadcaster_id: String,
    pub user_input: String,
    pub username: String,
    pub status: RedemptionStatus,
}

#[derive(Debug, Clone)]
struct PendingRedemption {
    user_input: String,
    username: String,
    channel: String,
    reward_id: String,
    broadcaster_id: String,
}

/// Redemption-id to pending-entry cache (§3), pruned on a timer by the
/// caller via [`RedemptionPendingCache::prune`].
pub struct RedemptionPendingCache {
    entries: TtlCache<String, PendingRedemption>,
}

impl RedemptionPendingCache {
    pub fn new() -> Self {
        Self {
            entries: TtlCache::new(Duration::from_secs(REDEMPTION_PENDING_TTL_SECS as u64), usize::MAX),
        }
    }

    pub fn prune(&mut self) {
        self.entries.evict_expired();
    }
}

impl Default for RedemptionPendingCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a redemption's text was rejected by content policy (§4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    Empty,
    Link,
    BannedWord(String),
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty redemption text"),
            Self::Link => write!(f, "text contains a link"),
            Self::BannedWord(word) => write!(f, "text contains banned word: {word}"),
        }
    }
}

/// Validate `text` against the reward's content policy (§4.4).
pub fn check_content_policy(text: &str, policy: &ContentPolicy) -> Result<(), PolicyViolation> {
    if text.trim().is_empty() {
        return Err(PolicyViolation::Empty);
    }
    if policy.block_links && (text.contains("http://") || text.contains("https://")) {
        return Err(PolicyViolation::Link);
    }
    let lower = text.to_lowercase();
    for banned in &policy.banned_words {
        if lower.contains(&banned.to_lowercase()) {
            return Err(PolicyViolation::BannedWord(banned.clone()));
        }
    }
    Ok(())
}

/// Outcome of processing a redemption event (§4.4).
#[derive(Debug, Clone, PartialEq)]
pub enum RedemptionOutcome {
    /// Nothing to speak: the event advanced internal state only (added to
    /// the pending cache, or removed from it on cancel).
    NoAudio,
    /// Content policy rejected the text; the caller should attempt the
    /// upstream cancel-and-refund, but never plays audio either way.
    Rejected(PolicyViolation),
    /// A work item ready to enqueue and publish to the bus.
    Speak(TtsWorkItem),
}

/// Apply the transition table in §4.4 for an `add` event.
pub fn handle_add(
    cache: &mut RedemptionPendingCache,
    event: &RedemptionEvent,
    policy: &ContentPolicy,
    read_full_urls: bool,
    voice: VoiceParams,
    enqueued_at_ms: u64,
    shared_session: Option<SharedSessionRef>,
) -> RedemptionOutcome {
    match event.status {
        RedemptionStatus::Unfulfilled => {
            cache.entries.insert(
                event.redemption_id.clone(),
                PendingRedemption {
                    user_input: event.user_input.clone(),
                    username: event.username.clone(),
                    channel: event.channel.clone(),
                    reward_id: event.reward_id.clone(),
                    broadcaster_id: event.broadcaster_id.clone(),
                },
            );
            RedemptionOutcome::NoAudio
        }
        RedemptionStatus::Fulfilled => speak_or_reject(
            &event.user_input,
            &event.username,
            policy,
            read_full_urls,
            voice,
            enqueued_at_ms,
            shared_session,
        ),
        RedemptionStatus::Canceled => {
            cache.entries.remove(&event.redemption_id);
            RedemptionOutcome::NoAudio
        }
    }
}

/// Apply the transition table in §4.4 for an `update` event.
pub fn handle_update(
    cache: &mut RedemptionPendingCache,
    event: &RedemptionEvent,
    policy: &ContentPolicy,
    read_full_urls: bool,
    voice: VoiceParams,
    enqueued_at_ms: u64,
    shared_session: Option<SharedSessionRef>,
) -> RedemptionOutcome {
    match event.status {
        RedemptionStatus::Fulfilled => {
            let Some(pending) = cache.entries.remove(&event.redemption_id) else {
                // Late notification of an item already handled on the
                // AutoFulfilled path at `add`-time; ignore.
                return RedemptionOutcome::NoAudio;
            };
            speak_or_reject(
                &pending.user_input,
                &pending.username,
                policy,
                read_full_urls,
                voice,
                enqueued_at_ms,
                shared_session,
            )
        }
        RedemptionStatus::Canceled => {
            cache.entries.remove(&event.redemption_id);
            RedemptionOutcome::NoAudio
        }
        RedemptionStatus::Unfulfilled => RedemptionOutcome::NoAudio,
    }
}

#[allow(clippy::too_many_arguments)]
fn speak_or_reject(
    user_input: &str,
    username: &str,
    policy: &ContentPolicy,
    read_full_urls: bool,
    voice: VoiceParams,
    enqueued_at_ms: u64,
    shared_session: Option<SharedSessionRef>,
) -> RedemptionOutcome {
    match check_content_policy(user_input, policy) {
        Err(violation) => RedemptionOutcome::Rejected(violation),
        Ok(()) => {
            let text = substitute_urls(user_input, read_full_urls);
            let mut item = TtsWorkItem::new(text, username, WorkItemType::Reward, voice, enqueued_at_ms);
            if let Some(session) = shared_session {
                item = item.with_shared_session(session);
            }
            RedemptionOutcome::Speak(item)
        }
    }
}

/// Attempt the upstream cancel-and-refund for a rejected redemption (§4.4).
/// Irrespective of refund success the audio is not played; callers should
/// log but not surface failures here.
pub async fn attempt_refund(
    platform: &Arc<dyn PlatformApi>,
    broadcaster_id: &str,
    reward_id: &str,
    redemption_id: &str,
    broadcaster_token: &Secret<String>,
) {
    if let Err(err) = platform
        .cancel_redemption(broadcaster_id, reward_id, redemption_id, broadcaster_token)
        .await
    {
        tracing::warn!(redemption_id, error = %err, "failed to cancel rejected redemption upstream");
    }
}
