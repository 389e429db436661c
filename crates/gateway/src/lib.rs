//! HTTP + WebSocket fan-out server (§4.3): overlay client registry behind
//! `ttsrelay_engine::FanOutPort`, the admin JSON API, and the static overlay
//! asset surface, assembled around the teacher's router/middleware layout.

pub mod admin_api;
pub mod admin_token;
pub mod error;
pub mod fanout;
pub mod rate_limit;
pub mod server;
pub mod static_files;
pub mod webhook_handler;
pub mod ws_handler;

pub use error::{Context, Error, Result};
pub use fanout::FanOutRegistry;
pub use rate_limit::RequestThrottle;
pub use server::{build_router, AppState};
