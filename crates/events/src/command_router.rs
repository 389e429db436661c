//! Command recognition hook (§4.2 step 3).
//!
//! The command surface itself is out of scope for this crate; the pipeline
//! only needs to know whether a chat line was claimed as a recognized
//! command, and under what name, so it can apply the decision table.

/// Outcome of offering a chat line to the command router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    NotClaimed,
    Claimed { name: String },
}

impl CommandOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed { .. })
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Claimed { name } => Some(name.as_str()),
            Self::NotClaimed => None,
        }
    }
}

/// Name of the command that toggles or queries TTS itself, excluded from the
/// "command was run" branch of the decision table so the line isn't spoken
/// back by the engine it controls.
pub const TTS_SELF_COMMAND: &str = "tts";

/// A pluggable recognizer for the command surface hosted elsewhere.
pub trait CommandRouter: Send + Sync {
    fn recognize(&self, text: &str) -> CommandOutcome;
}

/// Recognizes a fixed, caller-supplied set of command names prefixed with
/// `!`, without executing them. Suitable as the production recognizer when
/// the command surface is just a name lookup; callers owning a richer
/// command system can implement [`CommandRouter`] directly instead.
pub struct PrefixCommandRouter {
    prefix: char,
    known: Vec<String>,
}

impl PrefixCommandRouter {
    pub fn new(prefix: char, known: Vec<String>) -> Self {
        Self { prefix, known }
    }
}

impl CommandRouter for PrefixCommandRouter {
    fn recognize(&self, text: &str) -> CommandOutcome {
        let Some(rest) = text.trim_start().strip_prefix(self.prefix) else {
            return CommandOutcome::NotClaimed;
        };
        let name = rest.split_whitespace().next().unwrap_or("").to_lowercase();
        if self.known.iter().any(|k| k.eq_ignore_ascii_case(&name)) {
            CommandOutcome::Claimed { name }
        } else {
            CommandOutcome::NotClaimed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_known_command() {
        let router = PrefixCommandRouter::new('!', vec!["tts".to_string(), "voice".to_string()]);
        assert_eq!(
            router.recognize("!voice en-US"),
            CommandOutcome::Claimed { name: "voice".to_string() }
        );
    }

    #[test]
    fn ignores_unknown_command() {
        let router = PrefixCommandRouter::new('!', vec!["tts".to_string()]);
        assert_eq!(router.recognize("!discord"), CommandOutcome::NotClaimed);
    }

    #[test]
    fn plain_chat_is_not_claimed() {
        let router = PrefixCommandRouter::new('!', vec!["tts".to_string()]);
        assert_eq!(router.recognize("hello there"), CommandOutcome::NotClaimed);
    }
}
