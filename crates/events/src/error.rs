use thiserror::Error;

/// Error kinds from §7 produced by the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("replay guard: timestamp outside the 10-minute window")]
    ReplayGuard,

    #[error("duplicate event")]
    DuplicateEvent,

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ttsrelay_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

ttsrelay_common::impl_context!();
