pub mod catalog;
pub mod error;
pub mod synth;

pub use catalog::VOICE_CATALOG;
pub use error::{Context, Error, Result};
pub use synth::{HttpTtsSynthesizer, SynthesisOptions, SynthesizedAudio, TtsSynthesizer};
