//! Command-line flags and the validated runtime configuration built from
//! them (§10). Credential-bearing fields are wrapped in [`secrecy::Secret`]
//! as soon as they leave `clap`'s plain-`String` parsing, matching the
//! pattern every other crate in this workspace uses for its own secrets.

use std::path::PathBuf;

use clap::Parser;
use secrecy::Secret;

use crate::error::Error;

#[derive(Parser, Debug)]
#[command(name = "ttsrelay", about = "Multi-tenant TTS relay for live-streaming chat")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error); overridden by TTSRELAY_LOG.
    #[arg(long, default_value = "info", env = "TTSRELAY_LOG")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines.
    #[arg(long, default_value_t = false)]
    pub json_logs: bool,

    /// Address to bind the HTTP/WebSocket surface to.
    #[arg(long, default_value = "0.0.0.0", env = "TTSRELAY_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "TTSRELAY_PORT")]
    pub port: u16,

    /// Path to the SQLite database file.
    #[arg(long, default_value = "ttsrelay.db", env = "TTSRELAY_DB_PATH")]
    pub db_path: PathBuf,

    /// Trust X-Forwarded-For/X-Real-IP/CF-Connecting-IP for admin rate limiting.
    #[arg(long, default_value_t = false, env = "TTSRELAY_BEHIND_PROXY")]
    pub behind_proxy: bool,

    /// Allowed CORS origin for the admin/overlay surface.
    #[arg(long, default_value = "http://localhost:5173", env = "TTSRELAY_CORS_ORIGIN")]
    pub cors_origin: String,

    /// Login of the bot account used for the chat connection.
    #[arg(long, env = "TTSRELAY_BOT_LOGIN")]
    pub bot_login: Option<String>,

    /// Twitch application client id.
    #[arg(long, env = "TWITCH_CLIENT_ID")]
    pub twitch_client_id: Option<String>,

    /// Twitch application client secret.
    #[arg(long, env = "TWITCH_CLIENT_SECRET")]
    pub twitch_client_secret: Option<String>,

    /// Long-lived refresh token for the bot's chat-auth user token.
    #[arg(long, env = "TTSRELAY_CHAT_REFRESH_TOKEN")]
    pub chat_refresh_token: Option<String>,

    /// Shared secret EventSub signs webhook deliveries with.
    #[arg(long, env = "EVENTSUB_SECRET")]
    pub eventsub_secret: Option<String>,

    /// Secret used to sign admin bearer tokens.
    #[arg(long, env = "TTSRELAY_ADMIN_SECRET")]
    pub admin_secret: Option<String>,

    /// Base URL of the TTS synthesis provider.
    #[arg(long, env = "TTS_PROVIDER_BASE_URL")]
    pub tts_provider_base_url: Option<String>,

    /// API key for the TTS synthesis provider.
    #[arg(long, env = "TTS_PROVIDER_API_KEY")]
    pub tts_provider_api_key: Option<String>,
}

/// Validated configuration the rest of the process is wired from. Every
/// credential is a [`Secret<String>`] from this point on.
pub struct Config {
    pub log_level: String,
    pub json_logs: bool,
    pub bind: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub behind_proxy: bool,
    pub cors_origin: String,
    pub bot_login: String,
    pub twitch_client_id: String,
    pub twitch_client_secret: Secret<String>,
    pub chat_refresh_token: Secret<String>,
    pub eventsub_secret: Secret<String>,
    pub admin_secret: Secret<String>,
    pub tts_provider_base_url: String,
    pub tts_provider_api_key: Secret<String>,
}

fn require(value: Option<String>, name: &str) -> Result<String, Error> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| Error::ConfigMissing(name.to_string()))
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, Error> {
        Ok(Self {
            log_level: cli.log_level,
            json_logs: cli.json_logs,
            bind: cli.bind,
            port: cli.port,
            db_path: cli.db_path,
            behind_proxy: cli.behind_proxy,
            cors_origin: cli.cors_origin,
            bot_login: require(cli.bot_login, "--bot-login/TTSRELAY_BOT_LOGIN")?,
            twitch_client_id: require(cli.twitch_client_id, "--twitch-client-id/TWITCH_CLIENT_ID")?,
            twitch_client_secret: Secret::new(require(
                cli.twitch_client_secret,
                "--twitch-client-secret/TWITCH_CLIENT_SECRET",
            )?),
            chat_refresh_token: Secret::new(require(
                cli.chat_refresh_token,
                "--chat-refresh-token/TTSRELAY_CHAT_REFRESH_TOKEN",
            )?),
            eventsub_secret: Secret::new(require(cli.eventsub_secret, "--eventsub-secret/EVENTSUB_SECRET")?),
            admin_secret: Secret::new(require(cli.admin_secret, "--admin-secret/TTSRELAY_ADMIN_SECRET")?),
            tts_provider_base_url: require(
                cli.tts_provider_base_url,
                "--tts-provider-base-url/TTS_PROVIDER_BASE_URL",
            )?,
            tts_provider_api_key: Secret::new(require(
                cli.tts_provider_api_key,
                "--tts-provider-api-key/TTS_PROVIDER_API_KEY",
            )?),
        })
    }
}
