//! EegWindow: core container for multi-channel EEG data

use crate::error::{SsvepError, SsvepResult};
use crate::shape_error;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rectangular window of EEG samples, stored as (channels × samples)
#[derive(Debug, Clone)]
pub struct EegWindow {
    /// Unique identifier for this window
    pub id: Uuid,
    /// Sample matrix, one row per channel
    data: DMatrix<f64>,
    /// Sampling rate in Hz
    sampling_rate: f64,
    /// Creation timestamp (ms since the Unix epoch)
    pub created_at: u64,
}

impl EegWindow {
    /// Create a window from a (channels × samples) matrix
    pub fn new(data: DMatrix<f64>, sampling_rate: f64) -> SsvepResult<Self> {
        if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
            return Err(SsvepError::InvalidSamplingRate {
                rate: sampling_rate,
                reason: "must be positive and finite".to_string(),
            });
        }
        if data.nrows() == 0 {
            return Err(shape_error!("window has no channels"));
        }
        if data.ncols() == 0 {
            return Err(shape_error!("window has no samples"));
        }

        Ok(EegWindow {
            id: Uuid::new_v4(),
            data,
            sampling_rate,
            created_at: now_millis(),
        })
    }

    /// Create a window from one sample vector per channel
    pub fn from_channels(channels: &[Vec<f64>], sampling_rate: f64) -> SsvepResult<Self> {
        let channel_count = channels.len();
        if channel_count == 0 {
            return Err(shape_error!("window has no channels"));
        }

        let samples = channels[0].len();
        if let Some((idx, ch)) = channels.iter().enumerate().find(|(_, ch)| ch.len() != samples) {
            return Err(shape_error!(
                "channel {} has {} samples, channel 0 has {}",
                idx,
                ch.len(),
                samples
            ));
        }

        let data = DMatrix::from_fn(channel_count, samples, |ch, s| channels[ch][s]);
        Self::new(data, sampling_rate)
    }

    /// Create a window from interleaved samples
    /// `[ch0_s0, ch1_s0, ..., ch0_s1, ch1_s1, ...]`
    pub fn from_interleaved(
        data: &[f64],
        channel_count: usize,
        sampling_rate: f64,
    ) -> SsvepResult<Self> {
        if channel_count == 0 {
            return Err(shape_error!("window has no channels"));
        }
        if data.len() % channel_count != 0 {
            return Err(shape_error!(
                "{} interleaved values do not divide into {} channels",
                data.len(),
                channel_count
            ));
        }

        let samples = data.len() / channel_count;
        let matrix = DMatrix::from_fn(channel_count, samples, |ch, s| data[s * channel_count + ch]);
        Self::new(matrix, sampling_rate)
    }

    /// Build a window with the same sampling rate over new data of the same shape
    pub fn with_data(&self, data: DMatrix<f64>) -> SsvepResult<Self> {
        if data.shape() != self.data.shape() {
            return Err(shape_error!(
                "replacement data is {:?}, window is {:?}",
                data.shape(),
                self.data.shape()
            ));
        }
        Self::new(data, self.sampling_rate)
    }

    /// Sample matrix (channels × samples)
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Consume the window and return its sample matrix
    pub fn into_data(self) -> DMatrix<f64> {
        self.data
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples per channel
    pub fn samples_per_channel(&self) -> usize {
        self.data.ncols()
    }

    /// Sampling rate in Hz
    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Window duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples_per_channel() as f64 / self.sampling_rate
    }

    /// Copy of one channel's samples
    pub fn channel_data(&self, channel_index: usize) -> SsvepResult<Vec<f64>> {
        if channel_index >= self.channel_count() {
            return Err(shape_error!(
                "channel index {} out of bounds (0-{})",
                channel_index,
                self.channel_count() - 1
            ));
        }
        Ok(self.data.row(channel_index).iter().copied().collect())
    }

    /// Fail unless the window has exactly `expected` channels
    pub fn expect_channels(&self, expected: usize) -> SsvepResult<()> {
        if self.channel_count() != expected {
            return Err(SsvepError::ChannelMismatch {
                expected,
                actual: self.channel_count(),
            });
        }
        Ok(())
    }

    /// Multiply every sample by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        EegWindow {
            id: Uuid::new_v4(),
            data: &self.data * factor,
            sampling_rate: self.sampling_rate,
            created_at: now_millis(),
        }
    }

    /// Sample times in seconds, starting at `1 / fs`
    pub fn time_vector(&self) -> DVector<f64> {
        let fs = self.sampling_rate;
        DVector::from_fn(self.samples_per_channel(), |i, _| (i + 1) as f64 / fs)
    }

    /// Calculate basic statistics for a channel
    pub fn channel_stats(&self, channel_index: usize) -> SsvepResult<ChannelStats> {
        let data = self.channel_data(channel_index)?;
        Ok(ChannelStats::calculate(&data))
    }
}

/// A stack of equally shaped windows: (targets × channels × samples)
///
/// Used for offline evaluation, and as the trial dimension of the filter bank.
#[derive(Debug, Clone)]
pub struct EegBatch {
    windows: Vec<EegWindow>,
}

impl EegBatch {
    /// Create a batch, checking every window matches the first one
    pub fn new(windows: Vec<EegWindow>) -> SsvepResult<Self> {
        let first = windows
            .first()
            .ok_or_else(|| shape_error!("batch has no windows"))?;

        let channels = first.channel_count();
        let samples = first.samples_per_channel();
        let fs = first.sampling_rate();

        for (idx, window) in windows.iter().enumerate().skip(1) {
            if window.channel_count() != channels {
                return Err(SsvepError::ChannelMismatch {
                    expected: channels,
                    actual: window.channel_count(),
                });
            }
            if window.samples_per_channel() != samples {
                return Err(shape_error!(
                    "window {} has {} samples, window 0 has {}",
                    idx,
                    window.samples_per_channel(),
                    samples
                ));
            }
            if window.sampling_rate() != fs {
                return Err(SsvepError::InvalidSamplingRate {
                    rate: window.sampling_rate(),
                    reason: format!("window {} differs from batch rate {}Hz", idx, fs),
                });
            }
        }

        Ok(EegBatch { windows })
    }

    /// Create a batch from nested `[target][channel][sample]` vectors
    pub fn from_nested(data: &[Vec<Vec<f64>>], sampling_rate: f64) -> SsvepResult<Self> {
        let windows = data
            .iter()
            .map(|channels| EegWindow::from_channels(channels, sampling_rate))
            .collect::<SsvepResult<Vec<_>>>()?;
        Self::new(windows)
    }

    /// Number of windows (targets or trials)
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Batches are never empty, kept for API symmetry
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Shared channel count
    pub fn channel_count(&self) -> usize {
        self.windows[0].channel_count()
    }

    /// Shared sample count
    pub fn samples_per_channel(&self) -> usize {
        self.windows[0].samples_per_channel()
    }

    /// Shared sampling rate
    pub fn sampling_rate(&self) -> f64 {
        self.windows[0].sampling_rate()
    }

    /// Borrow the windows
    pub fn windows(&self) -> &[EegWindow] {
        &self.windows
    }

    /// Iterate over the windows
    pub fn iter(&self) -> std::slice::Iter<'_, EegWindow> {
        self.windows.iter()
    }
}

/// Basic statistics for a signal channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub rms: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub peak_to_peak: f64,
}

impl ChannelStats {
    pub fn calculate(data: &[f64]) -> Self {
        if data.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
            };
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let rms = (data.iter().map(|x| x * x).sum::<f64>() / n).sqrt();
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        let min = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        Self {
            mean,
            rms,
            std_dev: variance.sqrt(),
            min,
            max,
            peak_to_peak: max - min,
        }
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
