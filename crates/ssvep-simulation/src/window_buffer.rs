//! Bounded sample buffer that serves the most recent EEG window

use nalgebra::DMatrix;
use ssvep_core::{config_error, EegSource, EegWindow, SsvepError, SsvepResult};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tracing::warn;

/// Default history kept by the buffer (s)
pub const DEFAULT_BUFFER_SECONDS: f64 = 5.0;

/// Per-channel ring buffer fed with sample chunks.
///
/// Oldest samples are dropped once `capacity` samples per channel are held.
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    sampling_rate: f64,
    capacity: usize,
    channels: Vec<VecDeque<f64>>,
}

impl WindowBuffer {
    pub fn new(channel_count: usize, sampling_rate: f64, seconds: f64) -> SsvepResult<Self> {
        if channel_count == 0 {
            return Err(config_error!("buffer needs at least one channel"));
        }
        if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
            return Err(SsvepError::InvalidSamplingRate {
                rate: sampling_rate,
                reason: "must be positive and finite".to_string(),
            });
        }
        let capacity = (seconds * sampling_rate).round() as usize;
        if capacity == 0 {
            return Err(config_error!("buffer length {}s holds no samples", seconds));
        }

        Ok(WindowBuffer {
            sampling_rate,
            capacity,
            channels: vec![VecDeque::with_capacity(capacity); channel_count],
        })
    }

    /// Samples per channel the buffer can hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples per channel currently held
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a chunk; its channel count and rate must match the buffer
    pub fn push(&mut self, chunk: &EegWindow) -> SsvepResult<()> {
        chunk.expect_channels(self.channels.len())?;
        if chunk.sampling_rate() != self.sampling_rate {
            return Err(SsvepError::InvalidSamplingRate {
                rate: chunk.sampling_rate(),
                reason: format!("buffer runs at {}Hz", self.sampling_rate),
            });
        }

        let data = chunk.data();
        for (ch, buffer) in self.channels.iter_mut().enumerate() {
            buffer.extend(data.row(ch).iter().copied());
            let excess = buffer.len().saturating_sub(self.capacity);
            buffer.drain(..excess);
        }
        Ok(())
    }

    /// Most recent `samples` per channel
    pub fn latest(&self, samples: usize) -> SsvepResult<EegWindow> {
        let available = self.len();
        if samples == 0 || samples > available {
            return Err(SsvepError::InsufficientSamples {
                available,
                required: samples.max(1),
            });
        }

        let start = available - samples;
        let data = DMatrix::from_fn(self.channels.len(), samples, |ch, k| {
            self.channels[ch][start + k]
        });
        EegWindow::new(data, self.sampling_rate)
    }

    pub fn clear(&mut self) {
        for buffer in &mut self.channels {
            buffer.clear();
        }
    }
}

impl EegSource for WindowBuffer {
    fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn get_window(&mut self, seconds: f64) -> SsvepResult<EegWindow> {
        let samples = self.samples_for(seconds);
        self.latest(samples)
    }
}

/// EEG source backed by a broadcast chunk stream
pub struct StreamSource {
    receiver: broadcast::Receiver<EegWindow>,
    buffer: WindowBuffer,
}

impl StreamSource {
    pub fn new(receiver: broadcast::Receiver<EegWindow>, buffer: WindowBuffer) -> Self {
        Self { receiver, buffer }
    }

    /// Move every chunk already received into the buffer, returning how many
    pub fn drain(&mut self) -> SsvepResult<usize> {
        let mut received = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(chunk) => {
                    self.buffer.push(&chunk)?;
                    received += 1;
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("EEG stream lagged, {} chunks dropped", skipped);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    if received == 0 {
                        return Err(SsvepError::SourceError {
                            reason: "EEG stream closed".to_string(),
                        });
                    }
                    break;
                }
            }
        }
        Ok(received)
    }

    /// Wait until at least `seconds` of data are buffered
    pub async fn fill(&mut self, seconds: f64) -> SsvepResult<()> {
        let required = self.buffer.samples_for(seconds);
        if required > self.buffer.capacity() {
            return Err(SsvepError::InsufficientSamples {
                available: self.buffer.capacity(),
                required,
            });
        }

        while self.buffer.len() < required {
            match self.receiver.recv().await {
                Ok(chunk) => self.buffer.push(&chunk)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("EEG stream lagged, {} chunks dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(SsvepError::SourceError {
                        reason: "EEG stream closed".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn buffer(&self) -> &WindowBuffer {
        &self.buffer
    }

    /// Drop buffered samples, e.g. after the gaze target changed
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl EegSource for StreamSource {
    fn sampling_rate(&self) -> f64 {
        self.buffer.sampling_rate
    }

    fn channel_count(&self) -> usize {
        self.buffer.channel_count()
    }

    fn get_window(&mut self, seconds: f64) -> SsvepResult<EegWindow> {
        self.drain()?;
        self.buffer.get_window(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_chunk(start: usize, samples: usize, channels: usize) -> EegWindow {
        let data = DMatrix::from_fn(channels, samples, |ch, k| (start + k) as f64 + 1000.0 * ch as f64);
        EegWindow::new(data, 125.0).unwrap()
    }

    #[test]
    fn test_buffer_keeps_latest_samples() {
        let mut buffer = WindowBuffer::new(2, 125.0, 1.0).unwrap();
        assert_eq!(buffer.capacity(), 125);

        for i in 0..20 {
            buffer.push(&ramp_chunk(i * 10, 10, 2)).unwrap();
        }
        assert_eq!(buffer.len(), 125);

        let window = buffer.latest(5).unwrap();
        assert_eq!(window.data()[(0, 4)], 199.0);
        assert_eq!(window.data()[(0, 0)], 195.0);
        assert_eq!(window.data()[(1, 4)], 1199.0);
    }

    #[test]
    fn test_insufficient_samples() {
        let mut buffer = WindowBuffer::new(1, 125.0, DEFAULT_BUFFER_SECONDS).unwrap();
        buffer.push(&ramp_chunk(0, 100, 1)).unwrap();

        assert_eq!(
            buffer.get_window(2.0).unwrap_err(),
            SsvepError::InsufficientSamples { available: 100, required: 250 }
        );
        assert_eq!(buffer.get_window(0.8).unwrap().samples_per_channel(), 100);
    }

    #[test]
    fn test_rejects_mismatched_chunks() {
        let mut buffer = WindowBuffer::new(2, 125.0, 1.0).unwrap();
        assert_eq!(
            buffer.push(&ramp_chunk(0, 10, 3)),
            Err(SsvepError::ChannelMismatch { expected: 2, actual: 3 })
        );

        let other_rate = EegWindow::new(DMatrix::zeros(2, 10), 250.0).unwrap();
        assert!(matches!(buffer.push(&other_rate), Err(SsvepError::InvalidSamplingRate { .. })));
    }

    #[test]
    fn test_clear() {
        let mut buffer = WindowBuffer::new(1, 125.0, 1.0).unwrap();
        buffer.push(&ramp_chunk(0, 10, 1)).unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_stream_source_fill_and_drain() {
        let (sender, receiver) = broadcast::channel(16);
        let mut source = StreamSource::new(receiver, WindowBuffer::new(2, 125.0, 5.0).unwrap());

        for i in 0..3 {
            sender.send(ramp_chunk(i * 100, 100, 2)).unwrap();
        }
        source.fill(2.0).await.unwrap();
        assert!(source.buffer().len() >= 250);

        sender.send(ramp_chunk(300, 100, 2)).unwrap();
        let window = source.get_window(2.0).unwrap();
        assert_eq!(window.samples_per_channel(), 250);
        assert_eq!(window.data()[(0, 249)], 399.0);
    }

    #[tokio::test]
    async fn test_stream_source_closed() {
        let (sender, receiver) = broadcast::channel::<EegWindow>(4);
        let mut source = StreamSource::new(receiver, WindowBuffer::new(1, 125.0, 5.0).unwrap());
        drop(sender);

        assert!(matches!(source.fill(1.0).await, Err(SsvepError::SourceError { .. })));
        assert!(matches!(source.drain(), Err(SsvepError::SourceError { .. })));
    }
}
