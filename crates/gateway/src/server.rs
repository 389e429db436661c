//! Router assembly and shared application state (§4.3, §6). Grounded on the
//! teacher's `server.rs`: a cloneable `AppState`, a fixed-origin CORS layer,
//! and a middleware stack applied once over the whole router.

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use secrecy::Secret;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use ttsrelay_bus::EventBus;
use ttsrelay_chat::SecretCache;
use ttsrelay_events::{PlatformApi, ProcessedMessageWindow, RedemptionPendingCache, SessionRegistry};
use ttsrelay_protocol::ADMIN_BODY_LIMIT_BYTES;
use ttsrelay_store::{CachedChannelStore, SqliteManagedChannelsStore};

use crate::fanout::FanOutRegistry;
use crate::rate_limit::RequestThrottle;

#[derive(Clone)]
pub struct AppState {
    pub channels: Arc<CachedChannelStore>,
    pub managed_channels: Arc<SqliteManagedChannelsStore>,
    pub fanout: FanOutRegistry,
    pub request_throttle: RequestThrottle,
    pub admin_secret: Secret<String>,
    pub behind_proxy: bool,
    pub static_root: Option<PathBuf>,
    pub bus: Arc<dyn EventBus>,
    pub platform_api: Arc<dyn PlatformApi>,
    pub webhook_secret: Secret<String>,
    pub processed_messages: Arc<Mutex<ProcessedMessageWindow>>,
    pub redemption_cache: Arc<Mutex<RedemptionPendingCache>>,
    pub broadcaster_tokens: Arc<Mutex<SecretCache>>,
    /// Shared with the chat ingress (§3): the webhook path updates it from
    /// `channel.shared_chat.*` notifications, the chat pipeline reads it to
    /// attach a shared-session ref to outgoing work items.
    pub session_registry: Arc<Mutex<SessionRegistry>>,
}

pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            cors_origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("null")),
        )
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let admin_routes = Router::new()
        .route("/api/voices", get(crate::admin_api::get_voices))
        .route(
            "/api/channel/{login}/tts/settings",
            get(crate::admin_api::get_settings).put(crate::admin_api::put_settings),
        )
        .route(
            "/api/channel/{login}/tts/ignore",
            axum::routing::post(crate::admin_api::post_ignore).delete(crate::admin_api::delete_ignore),
        )
        .route(
            "/api/channel/{login}/overlay-token",
            axum::routing::post(crate::admin_api::post_overlay_token),
        )
        .layer(axum::middleware::from_fn_with_state(state.clone(), crate::rate_limit::throttle_gate));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/overlay", get(crate::ws_handler::overlay_ws_handler))
        .route("/twitch/event", post(crate::webhook_handler::twitch_event))
        .route("/favicon.ico", get(crate::static_files::icon_204))
        .route("/apple-touch-icon.png", get(crate::static_files::icon_204))
        .route("/assets/{*path}", get(crate::static_files::asset_handler))
        .merge(admin_routes)
        .layer(RequestBodyLimitLayer::new(ADMIN_BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}
