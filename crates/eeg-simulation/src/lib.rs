//! EEG-Simulation: synthetic event-related recordings
//!
//! Seeded generation of multichannel EEG with condition-specific evoked and
//! induced responses, for testing and demos without external datasets.

pub mod waveforms;
pub mod erp_simulator;

pub use erp_simulator::*;
pub use waveforms::*;
