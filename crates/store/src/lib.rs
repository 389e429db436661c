//! SQLite-backed implementation of the state-store collections named in §6,
//! plus the read-through caching and TTL-cache utilities shared by the
//! engine, event pipeline, and chat-ingress components.

pub mod cache;
pub mod channel_store;
pub mod error;
pub mod lease;
pub mod managed_channels;
pub mod read_through;
pub mod schema;
pub mod snapshot;
pub mod viewer_prefs;

pub use cache::TtlCache;
pub use channel_store::SqliteChannelStore;
pub use error::{Context, Error, Result};
pub use lease::SqliteLeaseStore;
pub use managed_channels::{ManagedChannel, SqliteManagedChannelsStore};
pub use read_through::CachedChannelStore;
pub use snapshot::{QueueSnapshot, SqliteSnapshotStore};
pub use viewer_prefs::SqliteViewerPrefsStore;
