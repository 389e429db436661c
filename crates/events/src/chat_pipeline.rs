//! Chat-message branch of the event pipeline: the decision table in §4.2.

use ttsrelay_protocol::{Channel, PermissionGate, ReadMode, VoiceParams, WorkItemType};

use crate::command_router::{CommandOutcome, TTS_SELF_COMMAND};

/// A chat line after bot-filtering and cheermote-stripping, ready for the
/// decision table.
#[derive(Debug, Clone)]
pub struct ChatLine {
    pub sender: String,
    pub text: String,
    pub is_moderator: bool,
    pub bits: Option<u32>,
}

/// Step 1-2 of §4.2: drop bot echoes and strip the leading cheermote token
/// when a bits count is present.
pub fn preprocess(line: &mut ChatLine, bot_login: &str) -> bool {
    if line.sender.eq_ignore_ascii_case(bot_login) {
        return false;
    }
    if line.bits.is_some() {
        if let Some((first, rest)) = line.text.split_once(' ') {
            if first.to_lowercase().starts_with("cheer") {
                line.text = rest.trim_start().to_string();
            }
        }
    }
    true
}

fn permission_satisfied(gate: PermissionGate, is_moderator: bool) -> bool {
    match gate {
        PermissionGate::Everyone => true,
        PermissionGate::Mods => is_moderator,
    }
}

/// A decision produced by the table in §4.2: what to speak, and as what
/// [`WorkItemType`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChatDecision {
    pub text: String,
    pub item_type: WorkItemType,
}

/// Apply the decision table from §4.2. `command` is the outcome of offering
/// the cleaned text to the command router; `original_text` is the line
/// before any URL transform, used verbatim for recognized commands.
pub fn decide(
    channel: &Channel,
    line: &ChatLine,
    command: &CommandOutcome,
    original_text: &str,
) -> Option<ChatDecision> {
    if !channel.engine_enabled || channel.is_ignored(&line.sender) {
        return None;
    }

    if let CommandOutcome::Claimed { name } = command
        && name != TTS_SELF_COMMAND
        && channel.read_mode == ReadMode::All
    {
        return Some(ChatDecision {
            text: original_text.to_string(),
            item_type: WorkItemType::Command,
        });
    }

    if channel.bits_gate.enabled {
        return match line.bits {
            Some(bits) if bits >= channel.bits_gate.minimum_amount => Some(ChatDecision {
                text: line.text.clone(),
                item_type: WorkItemType::CheerTts,
            }),
            _ => None,
        };
    }

    if channel.read_mode == ReadMode::All
        && permission_satisfied(channel.permission_gate, line.is_moderator)
    {
        return Some(ChatDecision {
            text: line.text.clone(),
            item_type: WorkItemType::Chat,
        });
    }

    None
}

/// Resolve the voice to speak a decided chat line with, given the already
/// layered channel/viewer overrides (§4.1 precedence table is applied by the
/// caller via `ttsrelay_protocol::resolve_voice_params`; this helper exists
/// so callers without per-viewer overrides still get the channel default).
pub fn channel_only_voice(channel: &Channel) -> VoiceParams {
    ttsrelay_protocol::resolve_voice_params(&[&channel.default_voice])
}
