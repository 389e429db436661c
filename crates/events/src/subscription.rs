//! Subscription-dispatch branch of the webhook pipeline (§4.2 condensed
//! table): narration composition for channel-point-adjacent EventSub
//! notification types, and shared-chat session bookkeeping.

use ttsrelay_protocol::{Channel, TtsWorkItem, VoiceParams, WorkItemType};

/// Speaker tag used for anonymous gifters/cheerers (§4.2).
pub const ANONYMOUS_SPEAKER: &str = "anonymous_cheerer";
/// Speaker tag used for all composed event narrations (§3).
pub const EVENT_SPEAKER: &str = "event_tts";

/// The EventSub notification shapes this branch narrates (§4.2).
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    Subscribe { user_name: String, tier: String },
    SubscriptionMessage { user_name: String, tier: String, message: String },
    SubscriptionGift { user_name: Option<String>, total: u32, tier: String },
    Cheer { user_name: Option<String>, bits: u32, message: String },
    Raid { from_broadcaster_user_name: String, viewers: u32 },
    Follow { user_name: String },
}

impl SubscriptionEvent {
    fn speaker(&self) -> &str {
        match self {
            Self::SubscriptionGift { user_name: None, .. } | Self::Cheer { user_name: None, .. } => {
                ANONYMOUS_SPEAKER
            }
            _ => EVENT_SPEAKER,
        }
    }

    /// Compose the fixed narration string for this event (§4.2).
    pub fn narrate(&self) -> String {
        match self {
            Self::Subscribe { user_name, tier } => {
                format!("{user_name} just subscribed at tier {tier}!")
            }
            Self::SubscriptionMessage { user_name, tier, message } => {
                format!("{user_name} resubscribed at tier {tier}! They said: {message}")
            }
            Self::SubscriptionGift { user_name, total, tier } => match user_name {
                Some(gifter) => format!("{gifter} gifted {total} tier {tier} subs!"),
                None => format!("An anonymous viewer gifted {total} tier {tier} subs!"),
            },
            // The chat path already speaks a cheer's raw message text as its
            // own work item; this webhook-path announcement stays bits-only
            // so a cheer that arrives on both paths isn't spoken twice.
            Self::Cheer { user_name, bits, .. } => match user_name {
                Some(cheerer) => format!("{cheerer} cheered {bits} bits!"),
                None => format!("An anonymous viewer cheered {bits} bits!"),
            },
            Self::Raid { from_broadcaster_user_name, viewers } => {
                format!("{from_broadcaster_user_name} is raiding with {viewers} viewers!")
            }
            Self::Follow { user_name } => format!("{user_name} just followed!"),
        }
    }
}

/// Decide whether `event` should be spoken for `channel`, and if so produce
/// the work item (§4.2: "only if the channel has engine + event-speech
/// enabled and the channel is in the allow-list"). `channel_allowed` carries
/// the allow-list membership check, which lives in the managed-channels
/// store rather than this crate.
pub fn dispatch(
    channel: &Channel,
    channel_allowed: bool,
    event: &SubscriptionEvent,
    voice: VoiceParams,
    enqueued_at_ms: u64,
) -> Option<TtsWorkItem> {
    if !channel.engine_enabled || !channel.event_speech || !channel_allowed {
        return None;
    }
    Some(TtsWorkItem::new(
        event.narrate(),
        event.speaker(),
        WorkItemType::Event,
        voice,
        enqueued_at_ms,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_channel() -> Channel {
        let mut c = Channel::new("streamer");
        c.engine_enabled = true;
        c.event_speech = true;
        c
    }

    #[test]
    fn disabled_event_speech_speaks_nothing() {
        let mut channel = ready_channel();
        channel.event_speech = false;
        let event = SubscriptionEvent::Follow { user_name: "viewer1".to_string() };
        assert!(dispatch(&channel, true, &event, VoiceParams::system_default(), 1).is_none());
    }

    #[test]
    fn channel_not_on_allow_list_speaks_nothing() {
        let channel = ready_channel();
        let event = SubscriptionEvent::Follow { user_name: "viewer1".to_string() };
        assert!(dispatch(&channel, false, &event, VoiceParams::system_default(), 1).is_none());
    }

    #[test]
    fn named_cheer_uses_event_speaker() {
        let channel = ready_channel();
        let event = SubscriptionEvent::Cheer {
            user_name: Some("viewer1".to_string()),
            bits: 500,
            message: "woo".to_string(),
        };
        let item = dispatch(&channel, true, &event, VoiceParams::system_default(), 1).unwrap();
        assert_eq!(item.speaker, EVENT_SPEAKER);
        assert!(item.text.contains("500 bits"));
    }

    #[test]
    fn anonymous_gift_uses_synthetic_speaker() {
        let channel = ready_channel();
        let event = SubscriptionEvent::SubscriptionGift { user_name: None, total: 5, tier: "1".to_string() };
        let item = dispatch(&channel, true, &event, VoiceParams::system_default(), 1).unwrap();
        assert_eq!(item.speaker, ANONYMOUS_SPEAKER);
    }

    #[test]
    fn raid_narration_includes_viewer_count() {
        let event = SubscriptionEvent::Raid {
            from_broadcaster_user_name: "otherstreamer".to_string(),
            viewers: 42,
        };
        assert!(event.narrate().contains("42 viewers"));
    }
}
