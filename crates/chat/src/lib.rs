//! Chat ingress (§4.5): leader-elected connection lifecycle, credential
//! refresh, and channel sync against the managed-channels store.
//!
//! This crate is organized as ports (`lease::LeaseHolder`,
//! `recovery::ChatClient`) around a concrete wire transport
//! (`transport::OutboundQueue` and the lifecycle states it shares with the
//! recovery state machine), matching the rest of the workspace's
//! port/adapter boundaries.

pub mod channel_sync;
pub mod error;
pub mod identity;
pub mod irc;
pub mod lease;
pub mod recovery;
pub mod secret_cache;
pub mod transport;

pub use channel_sync::{diff as diff_channels, ChannelDiff};
pub use error::{Context, Error, Result};
pub use identity::{IdentityClient, IssuedToken};
pub use irc::TwitchChatClient;
pub use lease::{run_lease_loop, LeaseHolder};
pub use recovery::{ChatClient, RecoveryCoordinator};
pub use secret_cache::SecretCache;
pub use transport::{DisconnectReason, OutboundQueue, TransportEvent, TransportState};
