//! Twitch IRC-over-WebSocket transport (§4.5, §6): the concrete
//! [`ChatClient`] adapter, grounded on the teacher's `tui::connection`
//! WebSocket read/write split but speaking Twitch's IRC line protocol
//! (`CAP REQ`, `PASS`/`NICK`, `JOIN`, tagged `PRIVMSG`) instead of the
//! teacher's JSON request/response frames.
//!
//! Reconnection is deliberately NOT handled here — [`crate::recovery`]
//! re-drives every `connect` call after refreshing the token, so this
//! adapter only ever runs a single connection attempt per `connect`.

use std::collections::HashSet;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, Secret};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use ttsrelay_protocol::CHAT_HANDSHAKE_TIMEOUT_MS;

use crate::recovery::ChatClient;
use crate::transport::{DisconnectReason, OutboundQueue, TransportEvent, TransportState};

const TWITCH_IRC_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

/// A single parsed IRC line: optional `@tag=value;...` prefix, optional
/// `:nick!user@host` source, the command verb, and trailing params.
#[derive(Debug, Default, PartialEq, Eq)]
struct ParsedLine {
    tags: Vec<(String, String)>,
    source_nick: Option<String>,
    command: String,
    params: Vec<String>,
}

fn parse_line(raw: &str) -> Option<ParsedLine> {
    let mut rest = raw.trim_end_matches(['\r', '\n']);
    if rest.is_empty() {
        return None;
    }

    let mut line = ParsedLine::default();

    if let Some(tag_rest) = rest.strip_prefix('@') {
        let (tag_part, remainder) = tag_rest.split_once(' ')?;
        rest = remainder;
        for pair in tag_part.split(';') {
            if let Some((k, v)) = pair.split_once('=') {
                line.tags.push((k.to_string(), v.to_string()));
            }
        }
    }

    if let Some(source_rest) = rest.strip_prefix(':') {
        let (source, remainder) = source_rest.split_once(' ')?;
        line.source_nick = source.split(['!', '@']).next().map(str::to_string);
        rest = remainder;
    }

    let (command, params_part) = match rest.split_once(' ') {
        Some((cmd, params)) => (cmd, params),
        None => (rest, ""),
    };
    line.command = command.to_string();

    if let Some(trailing) = params_part.strip_prefix(':') {
        line.params.push(trailing.to_string());
    } else if !params_part.is_empty() {
        let mut parts = params_part.splitn(2, " :");
        if let Some(middle) = parts.next() {
            line.params.extend(middle.split(' ').filter(|s| !s.is_empty()).map(str::to_string));
        }
        if let Some(trailing) = parts.next() {
            line.params.push(trailing.to_string());
        }
    }

    Some(line)
}

fn tag_value<'a>(line: &'a ParsedLine, key: &str) -> Option<&'a str> {
    line.tags.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Twitch IRC transport adapter implementing [`ChatClient`].
pub struct TwitchChatClient {
    bot_login: String,
    channels: Mutex<HashSet<String>>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    write_tx: Mutex<Option<mpsc::UnboundedSender<WsMessage>>>,
    state: StdMutex<TransportState>,
    outbound: Mutex<OutboundQueue>,
}

impl TwitchChatClient {
    pub fn new(bot_login: impl Into<String>, event_tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            bot_login: bot_login.into(),
            channels: Mutex::new(HashSet::new()),
            event_tx,
            write_tx: Mutex::new(None),
            state: StdMutex::new(TransportState::Idle),
            outbound: Mutex::new(OutboundQueue::new()),
        }
    }

    fn set_state(&self, next: TransportState) {
        *self.state.lock().unwrap() = next;
    }

    fn send_raw(&self, text: String) -> bool {
        let guard = self.write_tx.try_lock();
        match guard {
            Ok(guard) => match guard.as_ref() {
                Some(tx) => tx.send(WsMessage::Text(text.into())).is_ok(),
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Join a channel once connected (§4.5 channel sync calls this per
    /// `ChannelDiff::to_join` entry).
    pub async fn join(&self, channel: &str) {
        self.channels.lock().await.insert(channel.to_lowercase());
        self.send_raw(format!("JOIN #{}", channel.to_lowercase()));
    }

    /// Part a channel (per `ChannelDiff::to_part`).
    pub async fn part(&self, channel: &str) {
        self.channels.lock().await.remove(&channel.to_lowercase());
        self.send_raw(format!("PART #{}", channel.to_lowercase()));
    }

    /// Send a chat line, respecting the outbound rate limit and length cap
    /// (§6).
    pub async fn send_line(&self, channel: &str, text: &str) {
        let prepared = OutboundQueue::prepare_line(text);
        self.outbound.lock().await.pace().await;
        self.send_raw(format!("PRIVMSG #{} :{}", channel.to_lowercase(), prepared));
    }

    /// Channels currently tracked as joined, for the channel-sync poll loop
    /// to diff against the managed-channels store.
    pub async fn joined_channels(&self) -> HashSet<String> {
        self.channels.lock().await.clone()
    }
}

#[async_trait]
impl ChatClient for TwitchChatClient {
    fn state(&self) -> TransportState {
        *self.state.lock().unwrap()
    }

    async fn disconnect(&self) {
        if let Some(tx) = self.write_tx.lock().await.take() {
            let _ = tx.send(WsMessage::Close(None));
        }
        self.set_state(TransportState::Disconnected);
        let _ = self.event_tx.send(TransportEvent::Disconnected { reason: DisconnectReason::Requested });
    }

    async fn connect(&self, access_token: &Secret<String>) {
        self.set_state(TransportState::Connecting);

        let channels: Vec<String> = self.channels.lock().await.iter().cloned().collect();
        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<WsMessage>();
        *self.write_tx.lock().await = Some(write_tx);

        let ws_stream = match connect_async(TWITCH_IRC_URL).await {
            Ok((stream, _response)) => stream,
            Err(err) => {
                warn!(error = %err, "twitch irc connection failed");
                self.set_state(TransportState::Disconnected);
                let _ = self.event_tx.send(TransportEvent::Disconnected { reason: DisconnectReason::Generic });
                return;
            }
        };
        let (mut sink, mut stream) = ws_stream.split();

        let handshake = [
            "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership".to_string(),
            format!("PASS oauth:{}", access_token.expose_secret()),
            format!("NICK {}", self.bot_login),
        ];
        for line in handshake {
            if let Err(err) = sink.send(WsMessage::Text(line.into())).await {
                warn!(error = %err, "twitch irc handshake send failed");
                self.set_state(TransportState::Disconnected);
                let _ = self.event_tx.send(TransportEvent::Disconnected { reason: DisconnectReason::Generic });
                return;
            }
        }
        for channel in &channels {
            if let Err(err) = sink.send(WsMessage::Text(format!("JOIN #{channel}").into())).await {
                warn!(error = %err, %channel, "twitch irc join send failed");
            }
        }

        let timeout = std::time::Duration::from_millis(CHAT_HANDSHAKE_TIMEOUT_MS);
        let welcomed = tokio::time::timeout(timeout, wait_for_welcome(&mut stream)).await;
        match welcomed {
            Ok(Ok(true)) => {
                info!(bot_login = %self.bot_login, "connected to twitch irc");
                self.set_state(TransportState::Open);
                let _ = self.event_tx.send(TransportEvent::Connected);
            }
            Ok(Ok(false)) => {
                self.set_state(TransportState::Disconnected);
                let _ = self.event_tx.send(TransportEvent::Disconnected { reason: DisconnectReason::LoginFailure });
                return;
            }
            Ok(Err(_)) | Err(_) => {
                self.set_state(TransportState::Disconnected);
                let _ = self.event_tx.send(TransportEvent::Disconnected { reason: DisconnectReason::Timeout });
                return;
            }
        }

        let event_tx = self.event_tx.clone();
        let bot_login = self.bot_login.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = stream.next() => {
                        match msg {
                            Some(Ok(WsMessage::Text(text))) => {
                                for raw_line in text.split("\r\n").filter(|l| !l.is_empty()) {
                                    if let Some(reason) = handle_line(raw_line, &bot_login, &event_tx) {
                                        let _ = event_tx.send(TransportEvent::Disconnected { reason });
                                        return;
                                    }
                                }
                            }
                            Some(Ok(WsMessage::Ping(_))) => {}
                            Some(Ok(WsMessage::Close(_))) | None => {
                                debug!("twitch irc closed by server");
                                let _ = event_tx.send(TransportEvent::Disconnected { reason: DisconnectReason::Generic });
                                return;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                warn!(error = %err, "twitch irc read error");
                                let _ = event_tx.send(TransportEvent::Disconnected { reason: DisconnectReason::Generic });
                                return;
                            }
                        }
                    }
                    outgoing = write_rx.recv() => {
                        match outgoing {
                            Some(WsMessage::Close(_)) | None => {
                                let _ = sink.send(WsMessage::Close(None)).await;
                                return;
                            }
                            Some(line) => {
                                if sink.send(line).await.is_err() {
                                    let _ = event_tx.send(TransportEvent::Disconnected { reason: DisconnectReason::Generic });
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        });
    }
}

/// Returns `Some(true)` on `001` welcome, `Some(false)` on an auth-failure
/// `NOTICE`, keeps waiting on anything else, and propagates a read error as
/// `Err`.
async fn wait_for_welcome(
    stream: &mut (impl StreamExt<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin),
) -> Result<bool, ()> {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => {
                for raw_line in text.split("\r\n").filter(|l| !l.is_empty()) {
                    let Some(parsed) = parse_line(raw_line) else { continue };
                    if parsed.command == "001" {
                        return Ok(true);
                    }
                    if parsed.command == "NOTICE"
                        && parsed.params.last().is_some_and(|p| p.to_lowercase().contains("login authentication failed"))
                    {
                        return Ok(false);
                    }
                }
            }
            Ok(WsMessage::Close(_)) => return Err(()),
            Ok(_) => {}
            Err(_) => return Err(()),
        }
    }
    Err(())
}

/// Handle one post-handshake line, forwarding `PRIVMSG` and `NOTICE` as
/// [`TransportEvent`]s. Returns `Some(reason)` when the line itself ends the
/// connection (server-requested `RECONNECT`, or a post-connect auth notice).
fn handle_line(
    raw_line: &str,
    bot_login: &str,
    event_tx: &mpsc::UnboundedSender<TransportEvent>,
) -> Option<DisconnectReason> {
    let parsed = parse_line(raw_line)?;

    match parsed.command.as_str() {
        "PRIVMSG" => {
            let login = parsed.source_nick.unwrap_or_default();
            if login.eq_ignore_ascii_case(bot_login) {
                return None;
            }
            let channel = parsed.params.first().map(|p| p.trim_start_matches('#').to_string()).unwrap_or_default();
            let text = parsed.params.last().cloned().unwrap_or_default();
            let is_moderator = tag_value(&parsed, "badges")
                .is_some_and(|b| b.contains("moderator/") || b.contains("broadcaster/"));
            let bits = tag_value(&parsed, "bits").and_then(|b| b.parse::<u32>().ok());
            let _ = event_tx.send(TransportEvent::Message { channel, login, text, is_moderator, bits });
            None
        }
        "NOTICE" => {
            let text = parsed.params.last().cloned().unwrap_or_default();
            let _ = event_tx.send(TransportEvent::Notice { text });
            None
        }
        "RECONNECT" => Some(DisconnectReason::Generic),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_privmsg() {
        let raw = "@badges=moderator/1;bits=100;display-name=Viewer1 :viewer1!viewer1@viewer1.tmi.twitch.tv PRIVMSG #streamer :hello there";
        let parsed = parse_line(raw).unwrap();
        assert_eq!(parsed.command, "PRIVMSG");
        assert_eq!(parsed.source_nick.as_deref(), Some("viewer1"));
        assert_eq!(parsed.params, vec!["#streamer".to_string(), "hello there".to_string()]);
        assert_eq!(tag_value(&parsed, "bits"), Some("100"));
        assert!(tag_value(&parsed, "badges").unwrap().contains("moderator/"));
    }

    #[test]
    fn parses_welcome_without_tags_or_source() {
        let parsed = parse_line(":tmi.twitch.tv 001 relaybot :Welcome, GLHF!").unwrap();
        assert_eq!(parsed.command, "001");
        assert_eq!(parsed.source_nick.as_deref(), Some("tmi.twitch.tv"));
        assert_eq!(parsed.params.last().unwrap(), "Welcome, GLHF!");
    }

    #[test]
    fn empty_line_parses_to_none() {
        assert!(parse_line("").is_none());
        assert!(parse_line("\r\n").is_none());
    }

    #[test]
    fn handle_line_ignores_self_echo() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let raw = ":relaybot!relaybot@relaybot.tmi.twitch.tv PRIVMSG #streamer :hi";
        assert!(handle_line(raw, "relaybot", &tx).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn handle_line_forwards_privmsg_from_others() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let raw = ":viewer1!viewer1@viewer1.tmi.twitch.tv PRIVMSG #streamer :hi there";
        assert!(handle_line(raw, "relaybot", &tx).is_none());
        match rx.try_recv().unwrap() {
            TransportEvent::Message { channel, login, text, .. } => {
                assert_eq!(channel, "streamer");
                assert_eq!(login, "viewer1");
                assert_eq!(text, "hi there");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn reconnect_command_requests_disconnect() {
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(handle_line(":tmi.twitch.tv RECONNECT", "relaybot", &tx), Some(DisconnectReason::Generic));
    }

    #[test]
    fn new_client_starts_idle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = TwitchChatClient::new("relaybot", tx);
        assert_eq!(client.state(), TransportState::Idle);
    }
}
