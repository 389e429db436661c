//! The inbound event pipeline (§4.2): chat-message decision table, webhook
//! signature/replay/idempotency handling, subscription-event narration,
//! shared-chat session bookkeeping, and the channel-points redemption state
//! machine (§4.4). `ttsrelay-gateway` and `ttsrelay-cli` wire these modules
//! to the HTTP surface, the state store, and the cross-instance bus.

pub mod chat_pipeline;
pub mod command_router;
pub mod error;
pub mod platform_api;
pub mod redemption;
pub mod session_registry;
pub mod subscription;
pub mod text_transform;
pub mod webhook;

pub use chat_pipeline::{decide, preprocess, ChatDecision, ChatLine};
pub use command_router::{CommandOutcome, CommandRouter, PrefixCommandRouter, TTS_SELF_COMMAND};
pub use error::{Context, Error, Result};
pub use platform_api::{HelixPlatformApi, PlatformApi};
pub use redemption::{
    check_content_policy, handle_add, handle_update, PolicyViolation, RedemptionEvent,
    RedemptionOutcome, RedemptionPendingCache, RedemptionStatus,
};
pub use session_registry::SessionRegistry;
pub use subscription::{dispatch as dispatch_subscription, SubscriptionEvent, ANONYMOUS_SPEAKER, EVENT_SPEAKER};
pub use text_transform::substitute_urls;
pub use webhook::{
    check_replay_window, verify_signature, ProcessedMessageWindow, WebhookHeaders,
    MESSAGE_TYPE_NOTIFICATION, MESSAGE_TYPE_REVOCATION, MESSAGE_TYPE_VERIFICATION,
};
