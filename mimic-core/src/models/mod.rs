pub mod config;
pub mod error;
pub mod outcome;
pub mod phase;
pub mod verdict;
pub mod waveform;
