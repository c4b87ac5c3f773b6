//! EEG source capability consumed by the classification layer

use crate::eeg_window::EegWindow;
use crate::error::SsvepResult;

/// Anything that can hand out the most recent window of EEG samples.
///
/// Implementations may block in [`EegSource::get_window`] until enough
/// samples have arrived; the classifier itself never does I/O.
pub trait EegSource {
    /// Sampling rate in Hz
    fn sampling_rate(&self) -> f64;

    /// Number of channels delivered per window
    fn channel_count(&self) -> usize;

    /// Most recent `seconds` of data as a (channels × samples) window
    fn get_window(&mut self, seconds: f64) -> SsvepResult<EegWindow>;

    /// Samples per channel covered by `seconds`
    fn samples_for(&self, seconds: f64) -> usize {
        (seconds * self.sampling_rate()).round() as usize
    }
}

impl<S: EegSource + ?Sized> EegSource for Box<S> {
    fn sampling_rate(&self) -> f64 {
        (**self).sampling_rate()
    }

    fn channel_count(&self) -> usize {
        (**self).channel_count()
    }

    fn get_window(&mut self, seconds: f64) -> SsvepResult<EegWindow> {
        (**self).get_window(seconds)
    }
}
