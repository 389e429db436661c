//! Chat transport client (§4.5, §6): an IRC-like line protocol over a
//! WebSocket, with automatic reconnection explicitly disabled at this layer
//! — the recovery state machine in [`crate::recovery`] re-drives every
//! reconnect attempt itself so a token refresh can always precede it.

use ttsrelay_protocol::{CHAT_LINE_INTERVAL_MS, CHAT_LINE_MAX_CHARS};

/// Connection lifecycle states (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Connecting,
    Open,
    Closing,
    Disconnected,
}

/// Signals the adapter surfaces to the recovery state machine (§9: "wrapped
/// in an adapter exposing four signals on a single channel/queue
/// abstraction").
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: DisconnectReason },
    Message { channel: String, login: String, text: String, is_moderator: bool, bits: Option<u32> },
    Notice { text: String },
}

/// Why the transport dropped, classified enough for the recovery state
/// machine to decide whether to re-authenticate (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    LoginFailure,
    AuthExpired,
    Timeout,
    Generic,
    Requested,
}

impl DisconnectReason {
    /// Whether this reason should trigger the auth-recovery sequence (§4.5:
    /// "any disconnect whose reason suggests authentication/timeout/generic
    /// failure").
    pub fn requires_recovery(self) -> bool {
        !matches!(self, Self::Requested)
    }
}

/// Outbound line queue with the rate limit and truncation from §6.
pub struct OutboundQueue {
    last_sent_at: Option<std::time::Instant>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self { last_sent_at: None }
    }

    /// Truncate `text` to the outbound line limit, appending an ellipsis
    /// when truncated.
    pub fn prepare_line(text: &str) -> String {
        if text.chars().count() <= CHAT_LINE_MAX_CHARS {
            return text.to_string();
        }
        let mut truncated: String = text.chars().take(CHAT_LINE_MAX_CHARS.saturating_sub(1)).collect();
        truncated.push('…');
        truncated
    }

    /// Build the reply-parent tag for a native reply (§6).
    pub fn reply_tag(parent_message_id: &str) -> String {
        format!("@reply-parent-msg-id={parent_message_id}")
    }

    /// Sleep, if necessary, to respect the minimum inter-line spacing, then
    /// record the send time. Callers send the line after this returns.
    pub async fn pace(&mut self) {
        if let Some(last) = self.last_sent_at {
            let min_gap = std::time::Duration::from_millis(CHAT_LINE_INTERVAL_MS);
            let elapsed = last.elapsed();
            if elapsed < min_gap {
                tokio::time::sleep(min_gap - elapsed).await;
            }
        }
        self.last_sent_at = Some(std::time::Instant::now());
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_line_is_unchanged() {
        assert_eq!(OutboundQueue::prepare_line("hello"), "hello");
    }

    #[test]
    fn long_line_is_truncated_with_ellipsis() {
        let long = "a".repeat(CHAT_LINE_MAX_CHARS + 20);
        let prepared = OutboundQueue::prepare_line(&long);
        assert_eq!(prepared.chars().count(), CHAT_LINE_MAX_CHARS);
        assert!(prepared.ends_with('…'));
    }

    #[test]
    fn reply_tag_has_expected_shape() {
        assert_eq!(OutboundQueue::reply_tag("abc-123"), "@reply-parent-msg-id=abc-123");
    }

    #[test]
    fn requested_disconnect_does_not_need_recovery() {
        assert!(!DisconnectReason::Requested.requires_recovery());
    }

    #[test]
    fn auth_failures_need_recovery() {
        assert!(DisconnectReason::LoginFailure.requires_recovery());
        assert!(DisconnectReason::AuthExpired.requires_recovery());
        assert!(DisconnectReason::Timeout.requires_recovery());
        assert!(DisconnectReason::Generic.requires_recovery());
    }

    #[tokio::test]
    async fn pace_enforces_minimum_gap() {
        let mut queue = OutboundQueue::new();
        let start = std::time::Instant::now();
        queue.pace().await;
        queue.pace().await;
        assert!(start.elapsed() >= std::time::Duration::from_millis(CHAT_LINE_INTERVAL_MS));
    }
}
