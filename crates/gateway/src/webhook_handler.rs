//! Twitch EventSub webhook ingress, `POST /twitch/event` (§4.2, §6): header
//! extraction, signature verification, the challenge handshake, replay and
//! duplicate-delivery guards, then routing into the subscription-narration
//! and channel-points redemption branches of the event pipeline.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::warn;
use ttsrelay_events::{
    check_replay_window, dispatch_subscription, handle_add, handle_update, verify_signature,
    RedemptionEvent, RedemptionOutcome, RedemptionStatus, SubscriptionEvent, WebhookHeaders,
    MESSAGE_TYPE_NOTIFICATION, MESSAGE_TYPE_REVOCATION, MESSAGE_TYPE_VERIFICATION,
};
use ttsrelay_protocol::{BusEnvelope, Channel};

use crate::server::AppState;

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok().map(str::to_string)
}

fn extract_headers(headers: &HeaderMap) -> Option<WebhookHeaders> {
    Some(WebhookHeaders {
        message_id: header_value(headers, "twitch-eventsub-message-id")?,
        timestamp: header_value(headers, "twitch-eventsub-message-timestamp")?,
        signature: header_value(headers, "twitch-eventsub-message-signature")?,
        message_type: header_value(headers, "twitch-eventsub-message-type")?,
    })
}

#[derive(Debug, Deserialize)]
struct Subscription {
    r#type: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    subscription: Subscription,
    event: Option<serde_json::Value>,
    challenge: Option<String>,
}

pub async fn twitch_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> axum::response::Response {
    let Some(wh) = extract_headers(&headers) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    if let Err(err) = verify_signature(&wh, &body, state.webhook_secret.expose_secret()) {
        warn!(error = %err, "webhook signature rejected");
        return StatusCode::FORBIDDEN.into_response();
    }

    if let Err(err) = check_replay_window(&wh.timestamp, chrono::Utc::now()) {
        warn!(error = %err, "webhook delivery outside replay window");
        return StatusCode::FORBIDDEN.into_response();
    }

    let Ok(envelope) = serde_json::from_slice::<Envelope>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    if wh.message_type == MESSAGE_TYPE_VERIFICATION {
        return match envelope.challenge {
            Some(challenge) => (StatusCode::OK, challenge).into_response(),
            None => StatusCode::BAD_REQUEST.into_response(),
        };
    }

    if wh.message_type == MESSAGE_TYPE_REVOCATION {
        warn!(sub_type = %envelope.subscription.r#type, "subscription revoked upstream");
        return StatusCode::OK.into_response();
    }

    if wh.message_type != MESSAGE_TYPE_NOTIFICATION {
        return StatusCode::OK.into_response();
    }

    {
        let mut seen = state.processed_messages.lock().await;
        if seen.check_and_record(&wh.message_id).is_err() {
            return StatusCode::OK.into_response();
        }
    }

    let Some(event) = envelope.event else {
        return StatusCode::OK.into_response();
    };

    if let Err(err) = route_notification(&state, &envelope.subscription.r#type, &event).await {
        warn!(error = %err, sub_type = %envelope.subscription.r#type, "failed to route webhook notification");
    }

    StatusCode::OK.into_response()
}

async fn route_notification(
    state: &AppState,
    sub_type: &str,
    event: &serde_json::Value,
) -> crate::error::Result<()> {
    match sub_type {
        "channel.channel_points_custom_reward_redemption.add"
        | "channel.channel_points_custom_reward_redemption.update" => {
            route_redemption(state, sub_type, event).await
        }
        _ => route_narration(state, sub_type, event).await,
    }
}

fn str_field<'a>(event: &'a serde_json::Value, field: &str) -> &'a str {
    event.get(field).and_then(|v| v.as_str()).unwrap_or("")
}

fn u32_field(event: &serde_json::Value, field: &str) -> u32 {
    event.get(field).and_then(|v| v.as_u64()).unwrap_or(0) as u32
}

fn optional_user_name(event: &serde_json::Value) -> Option<String> {
    let anonymous = event.get("is_anonymous").and_then(|v| v.as_bool()).unwrap_or(false);
    if anonymous {
        None
    } else {
        event.get("user_name").and_then(|v| v.as_str()).map(str::to_string)
    }
}

/// Logins of every participant channel in a `channel.shared_chat.*` payload.
fn participant_logins(event: &serde_json::Value) -> Vec<String> {
    event
        .get("participants")
        .and_then(|v| v.as_array())
        .map(|participants| {
            participants
                .iter()
                .filter_map(|p| p.get("broadcaster_user_login").and_then(|v| v.as_str()))
                .map(str::to_lowercase)
                .collect()
        })
        .unwrap_or_default()
}

/// Updates the session registry for a shared-chat collab session (§3, §4.2).
/// These notifications carry no TTS narration of their own.
async fn route_shared_chat_session(state: &AppState, sub_type: &str, event: &serde_json::Value) {
    let session_id = str_field(event, "session_id");
    if session_id.is_empty() {
        return;
    }
    let mut registry = state.session_registry.lock().await;
    match sub_type {
        "channel.shared_chat.begin" => registry.begin(session_id, participant_logins(event)),
        "channel.shared_chat.update" => registry.update(session_id, participant_logins(event)),
        "channel.shared_chat.end" => registry.end(session_id),
        _ => {}
    }
}

async fn route_narration(
    state: &AppState,
    sub_type: &str,
    event: &serde_json::Value,
) -> crate::error::Result<()> {
    if matches!(
        sub_type,
        "channel.shared_chat.begin" | "channel.shared_chat.update" | "channel.shared_chat.end"
    ) {
        route_shared_chat_session(state, sub_type, event).await;
        return Ok(());
    }

    let login = str_field(event, "broadcaster_user_login").to_lowercase();
    if login.is_empty() {
        return Ok(());
    }

    let narration = match sub_type {
        "channel.follow" => Some(SubscriptionEvent::Follow {
            user_name: str_field(event, "user_name").to_string(),
        }),
        "channel.subscribe" => Some(SubscriptionEvent::Subscribe {
            user_name: str_field(event, "user_name").to_string(),
            tier: str_field(event, "tier").to_string(),
        }),
        "channel.subscription.message" => Some(SubscriptionEvent::SubscriptionMessage {
            user_name: str_field(event, "user_name").to_string(),
            tier: str_field(event, "tier").to_string(),
            message: event
                .get("message")
                .and_then(|m| m.get("text"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        }),
        "channel.subscription.gift" => Some(SubscriptionEvent::SubscriptionGift {
            user_name: optional_user_name(event),
            total: u32_field(event, "total"),
            tier: str_field(event, "tier").to_string(),
        }),
        "channel.cheer" => Some(SubscriptionEvent::Cheer {
            user_name: optional_user_name(event),
            bits: u32_field(event, "bits"),
            message: str_field(event, "message").to_string(),
        }),
        "channel.raid" => Some(SubscriptionEvent::Raid {
            from_broadcaster_user_name: str_field(event, "from_broadcaster_user_name").to_string(),
            viewers: u32_field(event, "viewers"),
        }),
        _ => None,
    };

    let Some(narration) = narration else {
        return Ok(());
    };

    let Some(managed) = state.managed_channels.get(&login).await.ok().flatten() else {
        return Ok(());
    };
    let channel = state
        .channels
        .get(&login)
        .await?
        .map(|c| c.as_ref().clone())
        .unwrap_or_else(|| Channel::new(&login));

    let voice = ttsrelay_protocol::resolve_voice_params(&[&channel.default_voice]);
    let now = ttsrelay_common::time::now_secs() as u64;

    if let Some(item) = dispatch_subscription(&channel, managed.is_active, &narration, voice, now) {
        publish(state, &login, item, now).await;
    }
    Ok(())
}

async fn route_redemption(
    state: &AppState,
    sub_type: &str,
    event: &serde_json::Value,
) -> crate::error::Result<()> {
    let login = str_field(event, "broadcaster_user_login").to_lowercase();
    if login.is_empty() {
        return Ok(());
    }
    let status_raw = str_field(event, "status");
    let status = match status_raw {
        "fulfilled" => RedemptionStatus::Fulfilled,
        "canceled" => RedemptionStatus::Canceled,
        _ => RedemptionStatus::Unfulfilled,
    };
    let reward_id = event
        .get("reward")
        .and_then(|r| r.get("id"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let redemption = RedemptionEvent {
        redemption_id: str_field(event, "id").to_string(),
        channel: login.clone(),
        reward_id: reward_id.clone(),
        broadcaster_id: str_field(event, "broadcaster_user_id").to_string(),
        user_input: str_field(event, "user_input").to_string(),
        username: str_field(event, "user_login").to_string(),
        status,
    };

    let channel = state
        .channels
        .get(&login)
        .await?
        .map(|c| c.as_ref().clone())
        .unwrap_or_else(|| Channel::new(&login));

    if !channel.engine_enabled {
        return Ok(());
    }

    let Some(binding) = channel.reward_binding.as_ref() else {
        return Ok(());
    };
    if !binding.enabled || binding.reward_id != reward_id {
        return Ok(());
    }

    let voice = ttsrelay_protocol::resolve_voice_params(&[&channel.default_voice]);
    let now = ttsrelay_common::time::now_secs() as u64;

    let mut cache = state.redemption_cache.lock().await;
    let outcome = match sub_type {
        "channel.channel_points_custom_reward_redemption.add" => handle_add(
            &mut cache,
            &redemption,
            &binding.content_policy,
            channel.read_full_urls,
            voice,
            now,
            None,
        ),
        _ => handle_update(
            &mut cache,
            &redemption,
            &binding.content_policy,
            channel.read_full_urls,
            voice,
            now,
            None,
        ),
    };
    drop(cache);

    match outcome {
        RedemptionOutcome::Speak(item) => publish(state, &login, item, now).await,
        RedemptionOutcome::Rejected(violation) => {
            warn!(%violation, redemption_id = %redemption.redemption_id, "redemption rejected by content policy");
            let token = state
                .broadcaster_tokens
                .lock()
                .await
                .get(&format!("broadcaster-token/{}", redemption.broadcaster_id))
                .cloned();
            match token {
                Some(token) => {
                    ttsrelay_events::redemption::attempt_refund(
                        &state.platform_api,
                        &redemption.broadcaster_id,
                        &redemption.reward_id,
                        &redemption.redemption_id,
                        &token,
                    )
                    .await;
                }
                None => warn!(
                    redemption_id = %redemption.redemption_id,
                    "no cached broadcaster token, skipping upstream refund"
                ),
            }
        }
        RedemptionOutcome::NoAudio => {}
    }
    Ok(())
}

async fn publish(state: &AppState, channel: &str, item: ttsrelay_protocol::TtsWorkItem, now_ms: u64) {
    let envelope = BusEnvelope {
        channel: channel.to_string(),
        item,
        source_revision: env!("CARGO_PKG_VERSION").to_string(),
        timestamp_ms: now_ms,
    };
    if let Err(err) = state.bus.publish(envelope).await {
        warn!(%channel, error = %err, "failed to publish tts event to bus");
    }
}
