//! Wire types and shared constants for the TTS relay.
//!
//! Protocol pieces: the overlay WebSocket frames in [`frame`], the
//! cross-instance bus envelope in [`bus`], and the channel/voice/work-item
//! data model in [`channel`], [`voice`], and [`work_item`].

pub mod bus;
pub mod channel;
pub mod frame;
pub mod voice;
pub mod work_item;

pub use bus::BusEnvelope;
pub use channel::{BitsGate, Channel, ContentPolicy, PermissionGate, ReadMode, RewardBinding};
pub use frame::OverlayFrame;
pub use voice::{
    resolve_voice_params, ChannelCount, VoiceOverride, VoiceParams, TTS_PITCH_MAX, TTS_PITCH_MIN,
    TTS_SPEED_MAX, TTS_SPEED_MIN,
};
pub use work_item::{SharedSessionRef, TtsWorkItem, WorkItemType};

// ── Constants ────────────────────────────────────────────────────────────────

/// Maximum number of pending items per channel queue.
pub const QUEUE_CAP: usize = 50;
/// Pacing delay between consecutive synthesis jobs on one channel.
pub const PACING_DELAY_MS: u64 = 500;
/// Hard timeout on a single synthesis call.
pub const SYNTHESIS_TIMEOUT_MS: u64 = 60_000;
/// Identity-provider token exchange timeout.
pub const IDENTITY_TIMEOUT_MS: u64 = 10_000;
/// Platform API call timeout.
pub const PLATFORM_API_TIMEOUT_MS: u64 = 9_000;
/// Chat transport handshake timeout.
pub const CHAT_HANDSHAKE_TIMEOUT_MS: u64 = 90_000;

/// Replay window for webhook notifications.
pub const WEBHOOK_REPLAY_WINDOW_SECS: i64 = 600;
/// Bound on the webhook idempotency window.
pub const WEBHOOK_DEDUPE_MAX_ENTRIES: usize = 1_000;

/// Chat-leader lease renewal interval.
pub const LEASE_RENEW_INTERVAL_SECS: u64 = 30;
/// Chat-leader lease time-to-live.
pub const LEASE_TTL_SECS: i64 = 120;

/// Redemption-pending cache entry TTL.
pub const REDEMPTION_PENDING_TTL_SECS: i64 = 24 * 3_600;
/// Redemption-pending cache prune interval.
pub const REDEMPTION_PRUNE_INTERVAL_SECS: u64 = 6 * 3_600;

/// Default read-through cache TTL for state-store reads.
pub const STATE_CACHE_TTL_SECS: u64 = 300;
/// Default secret cache TTL.
pub const SECRET_CACHE_TTL_SECS: i64 = 300;

/// Outbound chat rate limit: minimum spacing between lines.
pub const CHAT_LINE_INTERVAL_MS: u64 = 1_100;
/// Outbound chat line length cap before truncation.
pub const CHAT_LINE_MAX_CHARS: usize = 480;

/// Admin HTTP per-IP rate limit window.
pub const ADMIN_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
/// Admin HTTP per-IP request cap within the window.
pub const ADMIN_RATE_LIMIT_MAX_REQUESTS: u32 = 100;
/// Admin HTTP request body size cap.
pub const ADMIN_BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Name of the bus topic carrying spoken-event envelopes.
pub const BUS_TOPIC: &str = "tts-events";
/// Bus subscription inactivity expiry.
pub const BUS_SUBSCRIPTION_IDLE_SECS: u64 = 600;

/// Validity window for a minted overlay WebSocket token.
pub const OVERLAY_TOKEN_TTL_SECS: i64 = 30 * 24 * 3_600;

pub mod claims {
    /// JWT claim that must match the `{login}` path segment on admin endpoints.
    pub const USER_LOGIN: &str = "userLogin";
}
