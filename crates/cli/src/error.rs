//! The binary's own error type, used only at startup before any service is
//! listening. Everything past that point is `anyhow::Result` per §10 — this
//! type exists so config validation failures get a message distinct from a
//! bare `anyhow!(...)`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing required configuration: {0}")]
    ConfigMissing(String),
}
