//! SSVEP-Simulation: synthetic EEG generation and streaming
//!
//! Provides a seeded SSVEP EEG simulator, a real-time chunk stream and the
//! buffered EEG source consumed by online classification.

pub mod signal_patterns;
pub mod eeg_simulator;
pub mod real_time_stream;
pub mod window_buffer;

pub use signal_patterns::*;
pub use eeg_simulator::*;
pub use real_time_stream::*;
pub use window_buffer::*;
