//! Assembly of every store, port, and the shared [`AppState`] from a
//! validated [`Config`]. Mirrors the teacher's `server.rs` construction
//! order: open the pool, run schema init, build the read-through/cache
//! layers, then the ports the engine and HTTP surface depend on.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use ttsrelay_bus::{EventBus, InProcessBus};
use ttsrelay_engine::Engine;
use ttsrelay_events::{
    HelixPlatformApi, PlatformApi, ProcessedMessageWindow, RedemptionPendingCache, SessionRegistry,
};
use ttsrelay_gateway::{AppState, FanOutRegistry, RequestThrottle};
use ttsrelay_store::{
    CachedChannelStore, SqliteChannelStore, SqliteLeaseStore, SqliteManagedChannelsStore,
    SqliteSnapshotStore, SqliteViewerPrefsStore,
};
use ttsrelay_voice::HttpTtsSynthesizer;

use crate::config::Config;

/// Every long-lived handle `main` needs after assembly: the store pool
/// itself (chat ingress opens its own queries against the same handles
/// passed in here), the engine, and the gateway's `AppState`.
pub struct Runtime {
    pub pool: SqlitePool,
    pub engine: Arc<Engine>,
    pub bus: Arc<dyn EventBus>,
    pub app_state: AppState,
    pub channels: Arc<CachedChannelStore>,
    pub managed_channels: Arc<SqliteManagedChannelsStore>,
    pub viewer_prefs: Arc<SqliteViewerPrefsStore>,
    pub lease_store: Arc<SqliteLeaseStore>,
    pub session_registry: Arc<Mutex<SessionRegistry>>,
}

pub async fn build(config: &Config) -> anyhow::Result<Runtime> {
    let pool = SqlitePool::connect(&format!("sqlite://{}?mode=rwc", config.db_path.display())).await?;
    ttsrelay_store::schema::init(&pool).await?;

    let channels = Arc::new(CachedChannelStore::new(SqliteChannelStore::new(pool.clone())));
    let managed_channels = Arc::new(SqliteManagedChannelsStore::new(pool.clone()));
    let lease_store = Arc::new(SqliteLeaseStore::new(pool.clone()));
    let snapshots = Arc::new(SqliteSnapshotStore::new(pool.clone()));
    let viewer_prefs = Arc::new(SqliteViewerPrefsStore::new(pool.clone()));

    let fanout = FanOutRegistry::new();
    let synthesizer = Arc::new(HttpTtsSynthesizer::new(
        config.tts_provider_base_url.clone(),
        config.tts_provider_api_key.clone(),
    ));
    let engine = Arc::new(Engine::new(synthesizer, Arc::new(fanout.clone()), snapshots));
    engine.restore_all().await;

    let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new());
    let platform_api: Arc<dyn PlatformApi> = Arc::new(HelixPlatformApi::new(config.twitch_client_id.clone()));
    let session_registry = Arc::new(Mutex::new(SessionRegistry::new()));

    let app_state = AppState {
        channels: channels.clone(),
        managed_channels: managed_channels.clone(),
        fanout,
        request_throttle: RequestThrottle::new(),
        admin_secret: config.admin_secret.clone(),
        behind_proxy: config.behind_proxy,
        static_root: None,
        bus: bus.clone(),
        platform_api,
        webhook_secret: config.eventsub_secret.clone(),
        processed_messages: Arc::new(Mutex::new(ProcessedMessageWindow::new())),
        redemption_cache: Arc::new(Mutex::new(RedemptionPendingCache::new())),
        broadcaster_tokens: Arc::new(Mutex::new(ttsrelay_chat::SecretCache::new())),
        session_registry: session_registry.clone(),
    };

    Ok(Runtime {
        pool,
        engine,
        bus,
        app_state,
        channels,
        managed_channels,
        viewer_prefs,
        lease_store,
        session_registry,
    })
}
