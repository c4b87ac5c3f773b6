//! Synthetic SSVEP EEG generator
//!
//! Each channel carries the evoked response to the gazed stimulus (its
//! fundamental plus harmonics, with a per-channel phase lag) on top of
//! Gaussian background activity, slow baseline wander and optional
//! powerline interference. Samples are in microvolts.

use crate::signal_patterns::GazePattern;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use ssvep_core::{config_error, EegWindow, SsvepResult};
use std::f64::consts::PI;
use nalgebra::DMatrix;

/// Background activity added to every channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation (µV, 0.0 = no noise)
    pub gaussian_std: f64,
    /// Baseline wander amplitude (µV)
    pub baseline_wander: f64,
    /// Power line interference frequency (Hz)
    pub powerline_freq: Option<f64>,
    /// Power line interference amplitude (µV)
    pub powerline_amplitude: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 5.0,
            baseline_wander: 2.0,
            powerline_freq: Some(50.0),
            powerline_amplitude: 1.0,
        }
    }
}

/// Configuration for EEG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EegSimConfig {
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// Number of channels to simulate
    pub channel_count: usize,
    /// What the simulated user looks at
    pub gaze: GazePattern,
    /// Evoked response amplitude at the fundamental (µV)
    pub response_amplitude: f64,
    /// Relative amplitude of each harmonic, fundamental first
    pub harmonic_weights: Vec<f64>,
    /// Phase lag added per channel index (rad)
    pub channel_phase_step: f64,
    pub noise: NoiseConfig,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for EegSimConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 125.0,
            channel_count: 8,
            gaze: GazePattern::Idle,
            response_amplitude: 6.0,
            harmonic_weights: vec![1.0, 0.5, 0.25],
            channel_phase_step: 0.35,
            noise: NoiseConfig::default(),
            seed: None,
        }
    }
}

impl EegSimConfig {
    pub fn validate(&self) -> SsvepResult<()> {
        if !self.sampling_rate.is_finite() || self.sampling_rate <= 0.0 {
            return Err(config_error!(
                "simulator sampling rate must be positive, got {}",
                self.sampling_rate
            ));
        }
        if self.channel_count == 0 {
            return Err(config_error!("simulator needs at least one channel"));
        }
        if !self.response_amplitude.is_finite()
            || self.harmonic_weights.iter().any(|w| !w.is_finite())
        {
            return Err(config_error!("response amplitudes must be finite"));
        }
        if !self.noise.gaussian_std.is_finite() || self.noise.gaussian_std < 0.0 {
            return Err(config_error!(
                "noise standard deviation must be non-negative, got {}",
                self.noise.gaussian_std
            ));
        }
        Ok(())
    }
}

/// EEG simulator with a continuous time base across chunks
pub struct EegSimulator {
    config: EegSimConfig,
    rng: StdRng,
    normal_dist: Normal<f64>,
    /// Samples per channel generated so far
    sample_offset: u64,
    /// Fraction of a sample owed to the next chunk
    chunk_carry: f64,
}

impl EegSimulator {
    /// Create new EEG simulator with configuration
    pub fn new(config: EegSimConfig) -> SsvepResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let normal_dist = Self::noise_distribution(&config)?;

        Ok(EegSimulator {
            config,
            rng,
            normal_dist,
            sample_offset: 0,
            chunk_carry: 0.0,
        })
    }

    fn noise_distribution(config: &EegSimConfig) -> SsvepResult<Normal<f64>> {
        Normal::new(0.0, config.noise.gaussian_std)
            .map_err(|e| config_error!("Failed to create normal distribution: {}", e))
    }

    /// Generate `duration` seconds of EEG
    pub fn generate(&mut self, duration: f64) -> SsvepResult<EegWindow> {
        let samples = (duration * self.config.sampling_rate).round() as usize;
        self.generate_samples(samples)
    }

    /// Generate exactly `samples` samples per channel
    pub fn generate_samples(&mut self, samples: usize) -> SsvepResult<EegWindow> {
        if samples == 0 {
            return Err(config_error!("cannot generate an empty window"));
        }

        let fs = self.config.sampling_rate;
        let channels = self.config.channel_count;
        let mut data = DMatrix::zeros(channels, samples);

        for k in 0..samples {
            // Sample times start one period after zero, matching the reference time base
            let time = (self.sample_offset + k as u64 + 1) as f64 / fs;
            let gazed = self.config.gaze.frequency_at(time);

            for ch in 0..channels {
                let mut value = match gazed {
                    Some(frequency) => self.evoked_response(frequency, time, ch),
                    None => 0.0,
                };
                value += self.background(time);
                data[(ch, k)] = value;
            }
        }

        self.sample_offset += samples as u64;
        EegWindow::new(data, fs)
    }

    /// Generate continuous chunks for streaming.
    ///
    /// Chunks hold whole samples; the remainder is carried into the next
    /// chunk so the stream keeps the nominal sampling rate.
    pub fn generate_chunk(&mut self, chunk_duration: f64) -> SsvepResult<EegWindow> {
        let exact = chunk_duration * self.config.sampling_rate + self.chunk_carry;
        let samples = (exact + 1e-9).floor();
        if samples < 1.0 {
            return Err(config_error!(
                "chunk of {}s holds no samples at {}Hz",
                chunk_duration,
                self.config.sampling_rate
            ));
        }
        let window = self.generate_samples(samples as usize)?;
        self.chunk_carry = exact - samples;
        Ok(window)
    }

    fn evoked_response(&self, frequency: f64, time: f64, channel: usize) -> f64 {
        let phase = self.config.channel_phase_step * channel as f64;
        self.config
            .harmonic_weights
            .iter()
            .enumerate()
            .map(|(h, weight)| {
                let harmonic = (h + 1) as f64;
                weight * (2.0 * PI * harmonic * frequency * time + harmonic * phase).sin()
            })
            .sum::<f64>()
            * self.config.response_amplitude
    }

    fn background(&mut self, time: f64) -> f64 {
        let mut noise = self.normal_dist.sample(&mut self.rng);

        // Baseline wander (slow drift)
        noise += self.config.noise.baseline_wander * (2.0 * PI * 0.1 * time).sin();

        if let Some(freq) = self.config.noise.powerline_freq {
            noise += self.config.noise.powerline_amplitude * (2.0 * PI * freq * time).sin();
        }

        noise
    }

    /// Change what the simulated user looks at; the time base continues
    pub fn set_gaze(&mut self, gaze: GazePattern) {
        self.config.gaze = gaze;
    }

    pub fn gaze(&self) -> GazePattern {
        self.config.gaze
    }

    /// Seconds of signal generated since creation or the last reset
    pub fn elapsed(&self) -> f64 {
        self.sample_offset as f64 / self.config.sampling_rate
    }

    /// Reset time offset (useful for restarting simulation)
    pub fn reset_time(&mut self) {
        self.sample_offset = 0;
        self.chunk_carry = 0.0;
    }

    /// Get current configuration
    pub fn config(&self) -> &EegSimConfig {
        &self.config
    }

    /// Update configuration
    pub fn update_config(&mut self, config: EegSimConfig) -> SsvepResult<()> {
        config.validate()?;
        self.normal_dist = Self::noise_distribution(&config)?;
        self.config = config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn quiet_config(gaze: GazePattern) -> EegSimConfig {
        EegSimConfig {
            channel_count: 2,
            gaze,
            noise: NoiseConfig {
                gaussian_std: 0.0,
                baseline_wander: 0.0,
                powerline_freq: None,
                powerline_amplitude: 0.0,
            },
            seed: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_eeg_simulator_basic() {
        let mut simulator = EegSimulator::new(EegSimConfig {
            seed: Some(3),
            ..Default::default()
        })
        .unwrap();

        let window = simulator.generate(2.0).unwrap();

        assert_eq!(window.sampling_rate(), 125.0);
        assert_eq!(window.channel_count(), 8);
        assert_eq!(window.samples_per_channel(), 250);
        assert_abs_diff_eq!(simulator.elapsed(), 2.0, epsilon = 1e-12);

        for ch in 0..8 {
            assert!(window.channel_stats(ch).unwrap().std_dev > 0.0);
        }
    }

    #[test]
    fn test_noise_free_response_is_exact() {
        let mut simulator = EegSimulator::new(quiet_config(GazePattern::Fixed { frequency: 9.0 })).unwrap();
        let window = simulator.generate_samples(10).unwrap();

        let config = simulator.config().clone();
        let t = 1.0 / 125.0;
        let expected: f64 = config
            .harmonic_weights
            .iter()
            .enumerate()
            .map(|(h, w)| w * (2.0 * PI * (h + 1) as f64 * 9.0 * t).sin())
            .sum::<f64>()
            * config.response_amplitude;
        assert_abs_diff_eq!(window.data()[(0, 0)], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_time_base_is_continuous() {
        let config = quiet_config(GazePattern::Fixed { frequency: 11.0 });

        let mut whole = EegSimulator::new(config.clone()).unwrap();
        let full = whole.generate_samples(100).unwrap();

        let mut chunked = EegSimulator::new(config).unwrap();
        let first = chunked.generate_samples(40).unwrap();
        let second = chunked.generate_samples(60).unwrap();

        assert_abs_diff_eq!(first.data()[(1, 39)], full.data()[(1, 39)], epsilon = 1e-12);
        assert_abs_diff_eq!(second.data()[(1, 0)], full.data()[(1, 40)], epsilon = 1e-12);
    }

    #[test]
    fn test_chunks_keep_nominal_rate() {
        let mut simulator = EegSimulator::new(quiet_config(GazePattern::Idle)).unwrap();

        let sizes: Vec<usize> = (0..10)
            .map(|_| simulator.generate_chunk(0.1).unwrap().samples_per_channel())
            .collect();
        assert_eq!(sizes[..2], [12, 13]);
        assert_eq!(sizes.iter().sum::<usize>(), 125);
        assert_abs_diff_eq!(simulator.elapsed(), 1.0, epsilon = 1e-12);

        assert!(simulator.generate_chunk(0.001).is_err());
    }

    #[test]
    fn test_seed_is_reproducible() {
        let config = EegSimConfig {
            gaze: GazePattern::Fixed { frequency: 7.0 },
            seed: Some(42),
            ..Default::default()
        };
        let a = EegSimulator::new(config.clone()).unwrap().generate(1.0).unwrap();
        let b = EegSimulator::new(config).unwrap().generate(1.0).unwrap();
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_idle_gaze_is_background_only() {
        let mut simulator = EegSimulator::new(quiet_config(GazePattern::Idle)).unwrap();
        let window = simulator.generate(1.0).unwrap();
        assert!(window.data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_set_gaze_and_reset() {
        let mut simulator = EegSimulator::new(quiet_config(GazePattern::Idle)).unwrap();
        simulator.generate(0.5).unwrap();
        simulator.set_gaze(GazePattern::Fixed { frequency: 13.0 });
        assert_eq!(simulator.gaze(), GazePattern::Fixed { frequency: 13.0 });

        simulator.reset_time();
        assert_eq!(simulator.elapsed(), 0.0);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = EegSimConfig::default();
        config.channel_count = 0;
        assert!(EegSimulator::new(config).is_err());

        let mut config = EegSimConfig::default();
        config.noise.gaussian_std = -1.0;
        assert!(EegSimulator::new(config).is_err());

        let mut simulator = EegSimulator::new(EegSimConfig::default()).unwrap();
        assert!(simulator.generate_samples(0).is_err());
        let mut bad = EegSimConfig::default();
        bad.sampling_rate = 0.0;
        assert!(simulator.update_config(bad).is_err());
    }
}
