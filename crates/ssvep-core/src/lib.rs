//! SSVEP-Core: Foundation types for SSVEP classification
//!
//! EEG windows, stimulus layouts, decisions and the EEG source capability.

pub mod eeg_window;
pub mod stimulus;
pub mod source;
pub mod error;

pub use eeg_window::*;
pub use stimulus::*;
pub use source::EegSource;
pub use error::{SsvepError, SsvepResult};
