pub mod commands;
pub mod engine;
pub mod error;
pub mod fanout_port;
pub mod queue_state;
pub mod worker;

pub use commands::EngineCommand;
pub use engine::Engine;
pub use error::{Context, Error, Result};
pub use fanout_port::FanOutPort;
pub use queue_state::ChannelQueueState;

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use dashmap::DashSet;
    use tokio_util::sync::CancellationToken;
    use ttsrelay_protocol::{OverlayFrame, VoiceParams, WorkItemType, TtsWorkItem};
    use ttsrelay_voice::{SynthesizedAudio, TtsSynthesizer};

    use super::*;

    struct FakeSynth {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TtsSynthesizer for FakeSynth {
        async fn synthesize(
            &self,
            _text: &str,
            _voice: &VoiceParams,
            _cancel: CancellationToken,
        ) -> ttsrelay_voice::Result<SynthesizedAudio> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SynthesizedAudio {
                url: "https://cdn/out.mp3".to_string(),
                provider_id: "job".to_string(),
            })
        }
    }

    struct FakeFanOut {
        channels_with_clients: DashSet<String>,
        sent: DashSet<String>,
    }

    impl FanOutPort for FakeFanOut {
        fn has_active_clients(&self, channel: &str) -> bool {
            self.channels_with_clients.contains(channel)
        }

        fn send_audio(&self, channel: &str, frame: OverlayFrame) {
            self.sent.insert(format!("{channel}:{}", frame.to_json()));
        }
    }

    fn sample_item(speaker: &str) -> TtsWorkItem {
        TtsWorkItem::new(
            "hello",
            speaker,
            WorkItemType::Chat,
            VoiceParams::system_default(),
            1,
        )
    }

    async fn memory_snapshot_store() -> Arc<ttsrelay_store::SqliteSnapshotStore> {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        ttsrelay_store::schema::init(&pool).await.unwrap();
        Arc::new(ttsrelay_store::SqliteSnapshotStore::new(pool))
    }

    #[tokio::test]
    async fn item_is_dropped_when_no_active_clients() {
        let fanout = Arc::new(FakeFanOut {
            channels_with_clients: DashSet::new(),
            sent: DashSet::new(),
        });
        let synth = Arc::new(FakeSynth { calls: AtomicUsize::new(0) });
        let engine = Engine::new(synth.clone(), fanout.clone(), memory_snapshot_store().await);

        engine.enqueue("c", sample_item("viewer1"));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn item_is_synthesized_and_delivered_when_clients_present() {
        let fanout = Arc::new(FakeFanOut {
            channels_with_clients: DashSet::new(),
            sent: DashSet::new(),
        });
        fanout.channels_with_clients.insert("c".to_string());
        let synth = Arc::new(FakeSynth { calls: AtomicUsize::new(0) });
        let engine = Engine::new(synth.clone(), fanout.clone(), memory_snapshot_store().await);

        engine.enqueue("c", sample_item("viewer1"));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
        assert!(!fanout.sent.is_empty());
    }

    #[tokio::test]
    async fn stop_current_with_nothing_active_returns_false() {
        let fanout = Arc::new(FakeFanOut {
            channels_with_clients: DashSet::new(),
            sent: DashSet::new(),
        });
        let synth = Arc::new(FakeSynth { calls: AtomicUsize::new(0) });
        let engine = Engine::new(synth, fanout.clone(), memory_snapshot_store().await);

        let affected = engine.stop_current("c", "mod1", true).await;
        assert!(!affected);
        // A precautionary stop-audio is still sent.
        assert!(fanout.sent.iter().any(|s| s.contains("stopAudio")));
    }

    #[tokio::test]
    async fn pause_prevents_processing_until_resumed() {
        let fanout = Arc::new(FakeFanOut {
            channels_with_clients: DashSet::new(),
            sent: DashSet::new(),
        });
        fanout.channels_with_clients.insert("c".to_string());
        let synth = Arc::new(FakeSynth { calls: AtomicUsize::new(0) });
        let engine = Engine::new(synth.clone(), fanout, memory_snapshot_store().await);

        engine.pause("c");
        engine.enqueue("c", sample_item("viewer1"));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);

        engine.resume("c");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_drops_pending_items() {
        let fanout = Arc::new(FakeFanOut {
            channels_with_clients: DashSet::new(),
            sent: DashSet::new(),
        });
        let synth = Arc::new(FakeSynth { calls: AtomicUsize::new(0) });
        let engine = Engine::new(synth.clone(), fanout, memory_snapshot_store().await);

        engine.pause("c");
        engine.enqueue("c", sample_item("viewer1"));
        engine.clear("c");
        engine.resume("c");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }
}
