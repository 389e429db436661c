//! Wires the concrete chat transport into the pure decision modules in
//! `ttsrelay-events` (§4.2, §4.5): leader election drives connect/disconnect,
//! a short-interval poll against the managed-channels store keeps the
//! joined-channel set converged, and every inbound line runs through
//! preprocess → command recognition → the decision table → voice
//! resolution before reaching the engine and the cross-instance bus.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ttsrelay_bus::EventBus;
use ttsrelay_chat::{
    ChatClient, DisconnectReason, IdentityClient, LeaseHolder, RecoveryCoordinator, TransportEvent,
    TwitchChatClient,
};
use ttsrelay_engine::Engine;
use ttsrelay_events::{ChatLine, CommandRouter, PrefixCommandRouter, SessionRegistry, TTS_SELF_COMMAND};
use ttsrelay_protocol::{BusEnvelope, Channel, TtsWorkItem};
use ttsrelay_store::{CachedChannelStore, SqliteLeaseStore, SqliteManagedChannelsStore, SqliteViewerPrefsStore};
use uuid::Uuid;

use crate::config::Config;

/// Short-interval poll cadence for the channel-sync loop (§4.5, §6: SQLite
/// has no native change feed). Kept distinct from the lease renewal
/// interval so a slow lease tick doesn't delay channel convergence.
const CHANNEL_SYNC_INTERVAL_SECS: u64 = 15;

struct ChatLeaseHolder {
    chat_client: Arc<TwitchChatClient>,
    recovery: Arc<RecoveryCoordinator<TwitchChatClient>>,
}

#[async_trait]
impl LeaseHolder for ChatLeaseHolder {
    async fn on_acquired(&self) {
        // Bootstraps the very first connection too: the client starts in
        // `Idle`, so `run_recovery`'s disconnect-if-open guard is a no-op
        // and this just refreshes the token and connects.
        if let Err(err) = self.recovery.handle_disconnect(DisconnectReason::Generic).await {
            warn!(error = %err, "initial chat connect attempt failed");
        }
    }

    async fn on_lost(&self) {
        self.chat_client.disconnect().await;
    }
}

async fn run_channel_sync_loop(
    chat_client: Arc<TwitchChatClient>,
    managed_channels: Arc<SqliteManagedChannelsStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(CHANNEL_SYNC_INTERVAL_SECS));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let desired = match managed_channels.list_active().await {
                    Ok(desired) => desired,
                    Err(err) => {
                        warn!(error = %err, "failed to list active managed channels");
                        continue;
                    }
                };
                let joined = chat_client.joined_channels().await;
                let diff = ttsrelay_chat::diff_channels(&joined, &desired);
                for channel in diff.to_join {
                    chat_client.join(&channel).await;
                }
                for channel in diff.to_part {
                    chat_client.part(&channel).await;
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

async fn resolve_chat_voice(
    channel: &Channel,
    viewer_prefs: &SqliteViewerPrefsStore,
    sender: &str,
) -> ttsrelay_protocol::VoiceParams {
    if channel.honor_viewer_prefs {
        if let Ok(Some(pref)) = viewer_prefs.get(sender).await {
            return ttsrelay_protocol::resolve_voice_params(&[&pref, &channel.default_voice]);
        }
    }
    ttsrelay_protocol::resolve_voice_params(&[&channel.default_voice])
}

#[allow(clippy::too_many_arguments)]
async fn handle_message(
    channel_login: String,
    sender: String,
    text: String,
    is_moderator: bool,
    bits: Option<u32>,
    bot_login: &str,
    channels: &CachedChannelStore,
    viewer_prefs: &SqliteViewerPrefsStore,
    session_registry: &Mutex<SessionRegistry>,
    command_router: &PrefixCommandRouter,
    engine: &Engine,
    bus: &dyn EventBus,
) {
    let mut line = ChatLine { sender, text, is_moderator, bits };
    if !ttsrelay_events::preprocess(&mut line, bot_login) {
        return;
    }

    let command = command_router.recognize(&line.text);
    let original_text = line.text.clone();

    let channel = channels
        .get(&channel_login)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| Arc::new(Channel::new(&channel_login)));

    let Some(decision) = ttsrelay_events::decide(&channel, &line, &command, &original_text) else {
        return;
    };

    let voice = resolve_chat_voice(&channel, viewer_prefs, &line.sender).await;
    let now = ttsrelay_common::time::now_secs() as u64;
    let mut item = TtsWorkItem::new(decision.text, line.sender.clone(), decision.item_type, voice, now);
    if let Some(session) = session_registry.lock().await.session_for_channel(&channel_login) {
        item = item.with_shared_session(session);
    }

    engine.enqueue(&channel_login, item.clone());

    let envelope = BusEnvelope {
        channel: channel_login.clone(),
        item,
        source_revision: env!("CARGO_PKG_VERSION").to_string(),
        timestamp_ms: now,
    };
    if let Err(err) = bus.publish(envelope).await {
        warn!(channel = %channel_login, error = %err, "failed to publish chat tts event to bus");
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_chat_event_loop(
    mut event_rx: mpsc::UnboundedReceiver<TransportEvent>,
    recovery: Arc<RecoveryCoordinator<TwitchChatClient>>,
    bot_login: String,
    channels: Arc<CachedChannelStore>,
    viewer_prefs: Arc<SqliteViewerPrefsStore>,
    session_registry: Arc<Mutex<SessionRegistry>>,
    command_router: Arc<PrefixCommandRouter>,
    engine: Arc<Engine>,
    bus: Arc<dyn EventBus>,
) {
    while let Some(event) = event_rx.recv().await {
        match event {
            TransportEvent::Connected => info!("chat transport connected"),
            TransportEvent::Disconnected { reason } => {
                if let Err(err) = recovery.handle_disconnect(reason).await {
                    warn!(error = %err, "chat recovery attempt failed");
                }
            }
            TransportEvent::Notice { text } => debug!(%text, "chat notice"),
            TransportEvent::Message { channel, login, text, is_moderator, bits } => {
                handle_message(
                    channel,
                    login,
                    text,
                    is_moderator,
                    bits,
                    &bot_login,
                    &channels,
                    &viewer_prefs,
                    &session_registry,
                    &command_router,
                    &engine,
                    bus.as_ref(),
                )
                .await;
            }
        }
    }
}

/// Live handles for the chat-ingress background tasks, returned so the
/// graceful-shutdown sequence can tear them down in order (§5).
pub struct ChatIngress {
    pub chat_client: Arc<TwitchChatClient>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChatIngress {
    /// Disconnect the transport and wait for the background tasks to exit.
    /// Callers race this against a deadline; it's fine for it not to win.
    pub async fn shutdown(self) {
        self.chat_client.disconnect().await;
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn spawn(
    config: &Config,
    engine: Arc<Engine>,
    bus: Arc<dyn EventBus>,
    channels: Arc<CachedChannelStore>,
    managed_channels: Arc<SqliteManagedChannelsStore>,
    viewer_prefs: Arc<SqliteViewerPrefsStore>,
    lease_store: Arc<SqliteLeaseStore>,
    session_registry: Arc<Mutex<SessionRegistry>>,
    shutdown_rx: watch::Receiver<bool>,
) -> ChatIngress {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let chat_client = Arc::new(TwitchChatClient::new(config.bot_login.clone(), event_tx));
    let identity = IdentityClient::new(config.twitch_client_id.clone(), config.twitch_client_secret.clone());
    let recovery = Arc::new(RecoveryCoordinator::new(
        identity,
        chat_client.clone(),
        config.chat_refresh_token.clone(),
    ));
    let command_router = Arc::new(PrefixCommandRouter::new(
        '!',
        vec![TTS_SELF_COMMAND.to_string(), "voice".to_string()],
    ));
    let holder_id = format!("ttsrelay-{}", Uuid::new_v4());

    let consumer_task = tokio::spawn(run_chat_event_loop(
        event_rx,
        recovery.clone(),
        config.bot_login.clone(),
        channels,
        viewer_prefs,
        session_registry,
        command_router,
        engine,
        bus,
    ));

    let lease_holder = Arc::new(ChatLeaseHolder { chat_client: chat_client.clone(), recovery });
    let lease_task = tokio::spawn(ttsrelay_chat::run_lease_loop(
        lease_store,
        holder_id,
        lease_holder,
        shutdown_rx.clone(),
    ));

    let sync_task = tokio::spawn(run_channel_sync_loop(chat_client.clone(), managed_channels, shutdown_rx));

    ChatIngress { chat_client, tasks: vec![consumer_task, lease_task, sync_task] }
}
