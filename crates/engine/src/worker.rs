use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use ttsrelay_protocol::{OverlayFrame, TtsWorkItem, PACING_DELAY_MS};
use ttsrelay_voice::{SynthesizedAudio, TtsSynthesizer};

use crate::{commands::EngineCommand, fanout_port::FanOutPort, queue_state::ChannelQueueState};

/// Runs the per-channel actor mailbox (§5 scheduling model). Exactly one
/// instance per channel; at most one synthesis in flight at a time within
/// it. Engine-disabled and ignored-speaker admission checks (§4.1) are the
/// caller's responsibility — see DESIGN.md — since only the caller (the
/// event pipeline) holds the channel's config.
pub async fn run_channel_worker(
    channel: String,
    mut rx: mpsc::UnboundedReceiver<EngineCommand>,
    synthesizer: Arc<dyn TtsSynthesizer>,
    fanout: Arc<dyn FanOutPort>,
) {
    let mut state = ChannelQueueState::new();

    loop {
        if state.paused || state.items.is_empty() {
            match rx.recv().await {
                Some(cmd) => handle_command(&channel, cmd, &mut state, fanout.as_ref()),
                None => return,
            }
            continue;
        }

        // No-clients check happens at dequeue, per §4.1.
        if !fanout.has_active_clients(&channel) {
            state.items.pop_front();
            tracing::info!(channel = %channel, "dropping item: no active overlay clients");
            continue;
        }

        let Some(item) = state.items.pop_front() else {
            continue;
        };
        state.processing_now = true;
        state.current_speaker = Some(item.speaker.clone());

        // Step 3: if any prior cancellation token is still set, abort it first.
        if let Some(prior) = state.current_token.take() {
            prior.cancel();
        }
        let token = CancellationToken::new();
        state.current_token = Some(token.clone());

        let mut synth_fut =
            Box::pin(synthesizer.synthesize(&item.text, &item.voice, token.clone()));

        let result = loop {
            tokio::select! {
                biased;

                cmd = rx.recv() => {
                    match cmd {
                        Some(cmd) => handle_command(&channel, cmd, &mut state, fanout.as_ref()),
                        None => return,
                    }
                }

                result = &mut synth_fut => break result,
            }
        };

        process_result(&channel, item, token, result, &mut state, fanout.as_ref()).await;

        if !state.paused && !state.items.is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(PACING_DELAY_MS)).await;
        }
    }
}

fn handle_command(
    channel: &str,
    cmd: EngineCommand,
    state: &mut ChannelQueueState,
    fanout: &dyn FanOutPort,
) {
    match cmd {
        EngineCommand::Enqueue(item) => try_enqueue(channel, state, item),
        EngineCommand::Pause => state.paused = true,
        EngineCommand::Resume => state.paused = false,
        EngineCommand::Clear => state.items.clear(),
        EngineCommand::StopCurrent {
            requester,
            is_moderator,
            reply,
        } => {
            let affected = stop_current(state, &requester, is_moderator);
            // Always send a precautionary stop-audio: a moderator's stop is
            // authoritative at the client even if the server tracked nothing.
            fanout.send_audio(channel, OverlayFrame::StopAudio);
            let _ = reply.send(affected);
        }
        EngineCommand::Snapshot { reply } => {
            let _ = reply.send(state.snapshot_pending());
        }
    }
}

fn try_enqueue(channel: &str, state: &mut ChannelQueueState, item: TtsWorkItem) {
    if state.is_full() {
        tracing::warn!(channel, "queue full, dropping new item");
        return;
    }
    state.items.push_back(item);
}

/// §4.1 StopCurrent semantics: authority is either the current speaker
/// (self-stop) or a moderator. Returns true iff the abort or the stop-audio
/// broadcast actually affected tracked state.
fn stop_current(state: &mut ChannelQueueState, requester: &str, is_moderator: bool) -> bool {
    let authorized =
        is_moderator || state.current_speaker.as_deref() == Some(requester);
    if !authorized {
        return false;
    }

    let mut affected = false;
    if let Some(token) = state.current_token.take() {
        token.cancel();
        affected = true;
    }
    if state.current_playback_url.take().is_some() {
        affected = true;
    }
    affected
}

async fn process_result(
    channel: &str,
    item: TtsWorkItem,
    token: CancellationToken,
    result: ttsrelay_voice::Result<SynthesizedAudio>,
    state: &mut ChannelQueueState,
    fanout: &dyn FanOutPort,
) {
    match result {
        Ok(audio) => {
            state.current_playback_url = Some(audio.url.clone());
            let frame = OverlayFrame::PlayAudio { url: audio.url };
            match &item.shared_session {
                Some(session) => {
                    for participant in &session.participant_channels {
                        if fanout.has_active_clients(participant) {
                            fanout.send_audio(participant, frame.clone());
                        }
                    }
                }
                None => fanout.send_audio(channel, frame),
            }
        }
        Err(ttsrelay_voice::Error::AbortedByCaller) => {
            tracing::debug!(channel, speaker = %item.speaker, "synthesis aborted by caller");
            clear_if_current_token(state, &token);
        }
        Err(ttsrelay_voice::Error::InvalidVoice(reason)) => {
            tracing::warn!(channel, %reason, "invalid voice, dropping item");
            clear_if_current_token(state, &token);
        }
        Err(err) => {
            tracing::warn!(channel, error = %err, "tts upstream failure, dropping item");
            clear_if_current_token(state, &token);
        }
    }
    state.processing_now = false;
}

/// On cancellation/failure, clear the current-playback-url and
/// current-speaker (§4.1 step 8). Within a single channel's worker task the
/// installed token is always this item's token — the compare-and-swap
/// nullification rule from §5 is what guarantees that invariant, since
/// `current_token` is only ever replaced by this same worker one item at a
/// time, never raced against a concurrent writer.
fn clear_if_current_token(state: &mut ChannelQueueState, _token: &CancellationToken) {
    state.current_playback_url = None;
    state.current_speaker = None;
}
