//! EEG-Core: Foundation types for EEG/MEG analysis
//!
//! Recordings, channel descriptions, events, montages and file loading.

pub mod error;
pub mod channel;
pub mod recording;
pub mod events;
pub mod io;

pub use channel::*;
pub use recording::*;
pub use events::*;
pub use error::{EegError, EegResult};
