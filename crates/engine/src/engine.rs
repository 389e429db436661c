use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use ttsrelay_protocol::TtsWorkItem;
use ttsrelay_store::{QueueSnapshot, SqliteSnapshotStore};
use ttsrelay_voice::TtsSynthesizer;

use crate::{commands::EngineCommand, fanout_port::FanOutPort, worker::run_channel_worker};

struct ChannelHandle {
    sender: mpsc::UnboundedSender<EngineCommand>,
    task: tokio::task::JoinHandle<()>,
}

/// `PersistAll`/`RestoreAll` bracket process lifecycle (§4.1 contract).
/// Owns one actor task per channel, spawned lazily on first use.
pub struct Engine {
    channels: DashMap<String, ChannelHandle>,
    synthesizer: Arc<dyn TtsSynthesizer>,
    fanout: Arc<dyn FanOutPort>,
    snapshots: Arc<SqliteSnapshotStore>,
}

impl Engine {
    pub fn new(
        synthesizer: Arc<dyn TtsSynthesizer>,
        fanout: Arc<dyn FanOutPort>,
        snapshots: Arc<SqliteSnapshotStore>,
    ) -> Self {
        Self {
            channels: DashMap::new(),
            synthesizer,
            fanout,
            snapshots,
        }
    }

    fn sender_for(&self, channel: &str) -> mpsc::UnboundedSender<EngineCommand> {
        if let Some(handle) = self.channels.get(channel) {
            return handle.sender.clone();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_channel_worker(
            channel.to_string(),
            rx,
            Arc::clone(&self.synthesizer),
            Arc::clone(&self.fanout),
        ));
        self.channels.insert(
            channel.to_string(),
            ChannelHandle {
                sender: tx.clone(),
                task,
            },
        );
        tx
    }

    /// Returns synchronously after validating and appending, per the §4.1
    /// contract — the `send` on an unbounded mpsc channel never blocks.
    pub fn enqueue(&self, channel: &str, item: TtsWorkItem) {
        let _ = self.sender_for(channel).send(EngineCommand::Enqueue(item));
    }

    pub fn pause(&self, channel: &str) {
        let _ = self.sender_for(channel).send(EngineCommand::Pause);
    }

    pub fn resume(&self, channel: &str) {
        let _ = self.sender_for(channel).send(EngineCommand::Resume);
    }

    pub fn clear(&self, channel: &str) {
        let _ = self.sender_for(channel).send(EngineCommand::Clear);
    }

    /// Returns `true` iff the stop actually affected tracked state (§4.1).
    pub async fn stop_current(&self, channel: &str, requester: &str, is_moderator: bool) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .sender_for(channel)
            .send(EngineCommand::StopCurrent {
                requester: requester.to_string(),
                is_moderator,
                reply,
            })
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    async fn snapshot_of(&self, channel: &str) -> Option<QueueSnapshot> {
        let handle = self.channels.get(channel)?;
        let (reply, rx) = oneshot::channel();
        handle
            .sender
            .send(EngineCommand::Snapshot { reply })
            .ok()?;
        rx.await.ok()
    }

    /// Write a snapshot of pending items for every channel with a non-empty
    /// queue, on graceful shutdown (§4.1).
    pub async fn persist_all(&self) {
        let channel_names: Vec<String> =
            self.channels.iter().map(|entry| entry.key().clone()).collect();
        for channel in channel_names {
            if let Some(snapshot) = self.snapshot_of(&channel).await
                && !snapshot.items.is_empty()
                && let Err(err) = self.snapshots.save(&channel, &snapshot).await
            {
                tracing::warn!(channel, error = %err, "failed to persist queue snapshot");
            }
        }
    }

    /// After state-store init, read snapshots, refill per-channel queues,
    /// delete the snapshot records, and begin processing (§4.1). Shared-
    /// session descriptors are discarded on restore, since sessions may
    /// have ended (§4.1).
    pub async fn restore_all(&self) {
        let restored = match self.snapshots.take_all().await {
            Ok(restored) => restored,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read queue snapshots");
                return;
            }
        };
        for (channel, mut snapshot) in restored {
            for item in &mut snapshot.items {
                item.shared_session = None;
            }
            for item in snapshot.items {
                self.enqueue(&channel, item);
            }
            if snapshot.paused {
                self.pause(&channel);
            }
        }
    }

    pub fn shutdown(&self) {
        for entry in self.channels.iter() {
            entry.task.abort();
        }
    }
}
