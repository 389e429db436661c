//! Webhook intake: signature verification, replay guard, idempotency, and
//! the challenge handshake (§4.2).

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use ttsrelay_protocol::{WEBHOOK_DEDUPE_MAX_ENTRIES, WEBHOOK_REPLAY_WINDOW_SECS};
use ttsrelay_store::TtlCache;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Headers Twitch attaches to every EventSub webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookHeaders {
    pub message_id: String,
    pub timestamp: String,
    pub signature: String,
    pub message_type: String,
}

/// Verify `message-id ∥ timestamp ∥ body` against the header signature using
/// a constant-time comparison (§4.2).
pub fn verify_signature(headers: &WebhookHeaders, body: &[u8], secret: &str) -> Result<()> {
    let expected = headers
        .signature
        .strip_prefix("sha256=")
        .unwrap_or(&headers.signature);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::SignatureMismatch)?;
    mac.update(headers.message_id.as_bytes());
    mac.update(headers.timestamp.as_bytes());
    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    if constant_time_eq(&computed, expected) {
        Ok(())
    } else {
        Err(Error::SignatureMismatch)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Reject deliveries whose timestamp is older than the replay window (§4.2).
pub fn check_replay_window(timestamp: &str, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
    let sent_at = chrono::DateTime::parse_from_rfc3339(timestamp)
        .map_err(|_| Error::ReplayGuard)?
        .with_timezone(&chrono::Utc);
    let age = now.signed_duration_since(sent_at);
    if age.num_seconds() > WEBHOOK_REPLAY_WINDOW_SECS || age.num_seconds() < 0 {
        return Err(Error::ReplayGuard);
    }
    Ok(())
}

/// Bounded idempotency window over recently-seen message-ids (§3, §4.2).
pub struct ProcessedMessageWindow {
    seen: TtlCache<String, ()>,
}

impl ProcessedMessageWindow {
    pub fn new() -> Self {
        Self {
            seen: TtlCache::new(
                Duration::from_secs(WEBHOOK_REPLAY_WINDOW_SECS as u64),
                WEBHOOK_DEDUPE_MAX_ENTRIES,
            ),
        }
    }

    /// Returns `Err(DuplicateEvent)` if `message_id` has already been seen
    /// within the window; otherwise records it and returns `Ok(())`.
    pub fn check_and_record(&mut self, message_id: &str) -> Result<()> {
        if self.seen.check_and_insert(message_id.to_string(), ()) {
            return Err(Error::DuplicateEvent);
        }
        Ok(())
    }
}

impl Default for ProcessedMessageWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Twitch EventSub notification types this pipeline cares about (§4.2).
pub const MESSAGE_TYPE_VERIFICATION: &str = "webhook_callback_verification";
pub const MESSAGE_TYPE_NOTIFICATION: &str = "notification";
pub const MESSAGE_TYPE_REVOCATION: &str = "revocation";

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(message_id: &str, timestamp: &str, signature: &str) -> WebhookHeaders {
        WebhookHeaders {
            message_id: message_id.to_string(),
            timestamp: timestamp.to_string(),
            signature: signature.to_string(),
            message_type: MESSAGE_TYPE_NOTIFICATION.to_string(),
        }
    }

    fn sign(message_id: &str, timestamp: &str, body: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message_id.as_bytes());
        mac.update(timestamp.as_bytes());
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_is_accepted() {
        let body = b"{\"subscription\":{}}";
        let sig = sign("id-1", "2026-07-30T00:00:00Z", body, "secret");
        let headers = headers("id-1", "2026-07-30T00:00:00Z", &sig);
        assert!(verify_signature(&headers, body, "secret").is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let body = b"{\"subscription\":{}}";
        let sig = sign("id-1", "2026-07-30T00:00:00Z", body, "secret");
        let headers = headers("id-1", "2026-07-30T00:00:00Z", &sig);
        assert!(matches!(
            verify_signature(&headers, b"tampered", "secret"),
            Err(Error::SignatureMismatch)
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = b"payload";
        let sig = sign("id-1", "2026-07-30T00:00:00Z", body, "right-secret");
        let headers = headers("id-1", "2026-07-30T00:00:00Z", &sig);
        assert!(verify_signature(&headers, body, "wrong-secret").is_err());
    }

    #[test]
    fn recent_timestamp_passes_replay_guard() {
        let now = chrono::Utc::now();
        let sent = now - chrono::Duration::seconds(30);
        assert!(check_replay_window(&sent.to_rfc3339(), now).is_ok());
    }

    #[test]
    fn stale_timestamp_fails_replay_guard() {
        let now = chrono::Utc::now();
        let sent = now - chrono::Duration::seconds(WEBHOOK_REPLAY_WINDOW_SECS + 1);
        assert!(matches!(
            check_replay_window(&sent.to_rfc3339(), now),
            Err(Error::ReplayGuard)
        ));
    }

    #[test]
    fn duplicate_message_id_is_rejected() {
        let mut window = ProcessedMessageWindow::new();
        assert!(window.check_and_record("evt-1").is_ok());
        assert!(matches!(
            window.check_and_record("evt-1"),
            Err(Error::DuplicateEvent)
        ));
    }
}
