use thiserror::Error;

/// Error kinds from §7 that the engine itself produces or surfaces.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    /// Dropped head-of-new; logged at warn by the caller.
    #[error("queue full for channel")]
    QueueFull,

    /// Dropped at dequeue; logged at info by the caller.
    #[error("no active overlay clients for channel")]
    NoClients,

    #[error(transparent)]
    Synth(#[from] ttsrelay_voice::Error),
}

impl ttsrelay_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

ttsrelay_common::impl_context!();
