use thiserror::Error;

/// Error kinds named in §7 that are producible by the synthesizer client.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    /// The provider rejected the requested voice (substring `voice_id` in
    /// its error body, per §6).
    #[error("invalid voice: {0}")]
    InvalidVoice(String),

    /// Any other non-success response or transport failure.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    /// The caller's cancellation token fired before synthesis completed.
    /// Silent and expected (§7) — never logged as a warning by callers.
    #[error("aborted by caller")]
    AbortedByCaller,

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
