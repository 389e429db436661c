pub mod error;
pub mod time;

pub use error::{Context, Error, FromMessage, Result};
