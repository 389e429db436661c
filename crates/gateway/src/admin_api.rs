//! Administrative JSON API (§4.3, §6): per-channel TTS settings and the
//! ignore list, gated by the signed bearer token in [`crate::admin_token`].

use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use ttsrelay_protocol::{
    BitsGate, Channel, PermissionGate, ReadMode, VoiceOverride, OVERLAY_TOKEN_TTL_SECS, TTS_PITCH_MAX,
    TTS_PITCH_MIN, TTS_SPEED_MAX, TTS_SPEED_MIN,
};
use ttsrelay_voice::VOICE_CATALOG;

use crate::error::{Error, Result};
use crate::server::AppState;

fn check_admin_auth(headers: &HeaderMap, login: &str, state: &AppState) -> Result<()> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(Error::Unauthorized)?;

    let now = ttsrelay_common::time::now_secs();
    crate::admin_token::verify(token, login, &state.admin_secret, now).map_err(|_| Error::Unauthorized)
}

#[derive(Debug, Serialize)]
struct VoiceEntry {
    id: &'static str,
    name: &'static str,
}

pub async fn get_voices() -> Json<Vec<VoiceEntry>> {
    Json(VOICE_CATALOG.iter().map(|(id, name)| VoiceEntry { id, name }).collect())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelSettingsDto {
    pub engine_enabled: bool,
    pub read_mode: ReadMode,
    pub permission_gate: PermissionGate,
    pub event_speech: bool,
    pub bits_gate: BitsGate,
    pub default_voice: VoiceOverride,
    pub honor_viewer_prefs: bool,
}

impl From<&Channel> for ChannelSettingsDto {
    fn from(channel: &Channel) -> Self {
        Self {
            engine_enabled: channel.engine_enabled,
            read_mode: channel.read_mode,
            permission_gate: channel.permission_gate,
            event_speech: channel.event_speech,
            bits_gate: channel.bits_gate.clone(),
            default_voice: channel.default_voice.clone(),
            honor_viewer_prefs: channel.honor_viewer_prefs,
        }
    }
}

pub async fn get_settings(
    State(state): State<AppState>,
    Path(login): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ChannelSettingsDto>> {
    check_admin_auth(&headers, &login, &state)?;

    let channel = state.channels.get(&login).await?;
    let dto = match channel {
        Some(channel) => ChannelSettingsDto::from(channel.as_ref()),
        None => ChannelSettingsDto::from(&Channel::new(&login)),
    };
    Ok(Json(dto))
}

fn validate_voice_override(voice: &VoiceOverride) -> Result<()> {
    if let Some(pitch) = voice.pitch {
        if !(TTS_PITCH_MIN..=TTS_PITCH_MAX).contains(&pitch) {
            return Err(Error::ValidationError(format!(
                "pitch must be between {TTS_PITCH_MIN} and {TTS_PITCH_MAX}"
            )));
        }
    }
    if let Some(speed) = voice.speed {
        if !(TTS_SPEED_MIN..=TTS_SPEED_MAX).contains(&speed) {
            return Err(Error::ValidationError(format!(
                "speed must be between {TTS_SPEED_MIN} and {TTS_SPEED_MAX}"
            )));
        }
    }
    Ok(())
}

pub async fn put_settings(
    State(state): State<AppState>,
    Path(login): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ChannelSettingsDto>,
) -> Result<Json<ChannelSettingsDto>> {
    check_admin_auth(&headers, &login, &state)?;
    validate_voice_override(&body.default_voice)?;

    let mut channel = match state.channels.get(&login).await? {
        Some(channel) => channel.as_ref().clone(),
        None => Channel::new(&login),
    };

    channel.engine_enabled = body.engine_enabled;
    channel.read_mode = body.read_mode;
    channel.permission_gate = body.permission_gate;
    channel.event_speech = body.event_speech;
    channel.bits_gate = body.bits_gate;
    channel.default_voice = body.default_voice;
    channel.honor_viewer_prefs = body.honor_viewer_prefs;

    state.channels.upsert(&channel).await?;
    Ok(Json(ChannelSettingsDto::from(&channel)))
}

#[derive(Debug, Deserialize)]
pub struct IgnoreRequest {
    pub username: String,
}

pub async fn post_ignore(
    State(state): State<AppState>,
    Path(login): Path<String>,
    headers: HeaderMap,
    Json(body): Json<IgnoreRequest>,
) -> Result<StatusCode> {
    check_admin_auth(&headers, &login, &state)?;
    set_ignored(&state, &login, &body.username, true).await
}

pub async fn delete_ignore(
    State(state): State<AppState>,
    Path(login): Path<String>,
    headers: HeaderMap,
    Json(body): Json<IgnoreRequest>,
) -> Result<StatusCode> {
    check_admin_auth(&headers, &login, &state)?;
    set_ignored(&state, &login, &body.username, false).await
}

#[derive(Debug, Serialize)]
pub struct OverlayTokenDto {
    pub token: String,
}

/// Mint (and persist, for display/audit) a fresh signed overlay token for
/// `login`'s WebSocket surface (§4.3).
pub async fn post_overlay_token(
    State(state): State<AppState>,
    Path(login): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OverlayTokenDto>> {
    check_admin_auth(&headers, &login, &state)?;

    let now = ttsrelay_common::time::now_secs();
    let token = crate::admin_token::issue_overlay_token(&login, now + OVERLAY_TOKEN_TTL_SECS, &state.admin_secret);
    state.managed_channels.set_overlay_token(&login, Some(&token)).await?;
    Ok(Json(OverlayTokenDto { token }))
}

async fn set_ignored(state: &AppState, login: &str, username: &str, ignored: bool) -> Result<StatusCode> {
    let mut channel = match state.channels.get(login).await? {
        Some(channel) => channel.as_ref().clone(),
        None => Channel::new(login),
    };

    let username = username.to_lowercase();
    if ignored {
        channel.ignored_users.insert(username);
    } else {
        channel.ignored_users.remove(&username);
    }

    state.channels.upsert(&channel).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    #[test]
    fn validate_voice_override_rejects_out_of_range_pitch() {
        let voice = VoiceOverride { pitch: Some(99), ..Default::default() };
        assert!(validate_voice_override(&voice).is_err());
    }

    #[test]
    fn validate_voice_override_accepts_defaults() {
        assert!(validate_voice_override(&VoiceOverride::default()).is_ok());
    }

    #[test]
    fn validate_voice_override_rejects_out_of_range_speed() {
        let voice = VoiceOverride { speed: Some(10.0), ..Default::default() };
        assert!(validate_voice_override(&voice).is_err());
    }

    #[test]
    fn admin_auth_rejects_missing_header() {
        let secret = Secret::new("s".to_string());
        let headers = HeaderMap::new();
        assert!(crate::admin_token::verify("", "login", &secret, 0).is_err());
        assert!(headers.get(axum::http::header::AUTHORIZATION).is_none());
    }
}
