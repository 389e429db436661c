//! Cross-instance pub/sub abstraction for the `tts-events` topic (§4.2, §6).
//!
//! Every replica subscribes independently so all replicas receive every
//! envelope; the consuming engine is responsible for dropping duplicates it
//! has no overlay clients for. This crate ships the trait boundary plus an
//! in-process broadcast implementation suitable for a single-process
//! deployment or for tests; a production multi-host deployment would swap
//! in a Redis- or NATS-backed implementation behind the same trait.

pub mod error;
pub mod inprocess;

pub use error::{Context, Error, Result};
pub use inprocess::InProcessBus;

use async_trait::async_trait;
use ttsrelay_protocol::BusEnvelope;

/// A live subscription to the bus topic. Dropping it unsubscribes.
#[async_trait]
pub trait BusSubscription: Send {
    async fn recv(&mut self) -> Option<BusEnvelope>;
}

/// The publish/subscribe port the event pipeline and engine depend on.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, envelope: BusEnvelope) -> Result<()>;

    /// Create a new subscription with a unique random suffix, per §6, so
    /// concurrently-running replicas (or, in tests, concurrent consumers)
    /// each see every published envelope independently.
    fn subscribe(&self) -> Box<dyn BusSubscription>;
}
