//! Configuration management for FBCCA classification

use crate::filters::{NUM_SUBBANDS, UPPER_STOPBAND_HZ};
use crate::fusion::DEFAULT_THRESHOLD;
use serde::{Deserialize, Serialize};
use ssvep_core::{config_error, SsvepError, SsvepResult, StimulusLayout};
use std::path::Path;

/// Classification profiles for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierProfile {
    /// Online control, one window every classification interval
    Online,
    /// Offline evaluation of recorded trial batches
    Offline,
    /// Custom profile
    Custom,
}

/// Everything the classifier needs; nothing is defaulted inside the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Configuration name
    pub name: String,
    /// Target use case
    pub profile: ClassifierProfile,
    /// EEG sampling rate (Hz)
    pub sampling_rate: f64,
    /// Candidate frequencies and the commands they drive
    pub layout: StimulusLayout,
    /// Harmonics per reference signal
    pub harmonics: usize,
    /// Sub-bands fused per decision (1..=10)
    pub num_subbands: usize,
    /// Classification window length (s)
    pub window_seconds: f64,
    /// Minimum fused score for a real-time decision
    pub threshold: f64,
    /// Score sub-bands and batch trials on the rayon pool
    pub parallel: bool,
}

impl ClassifierConfig {
    /// Online control defaults: 125 Hz, 7/9/11/13 Hz, 3 harmonics,
    /// 5 sub-bands, 2 s windows, threshold 2.5
    pub fn online() -> Self {
        ClassifierConfig {
            name: "Online SSVEP".to_string(),
            profile: ClassifierProfile::Online,
            sampling_rate: 125.0,
            layout: StimulusLayout::four_way(),
            harmonics: 3,
            num_subbands: 5,
            window_seconds: 2.0,
            threshold: DEFAULT_THRESHOLD,
            parallel: false,
        }
    }

    /// Offline evaluation: same parameters, parallel scoring
    pub fn offline() -> Self {
        ClassifierConfig {
            name: "Offline SSVEP".to_string(),
            profile: ClassifierProfile::Offline,
            parallel: true,
            ..Self::online()
        }
    }

    /// Create configuration suitable for given profile
    pub fn for_profile(profile: ClassifierProfile) -> Self {
        match profile {
            ClassifierProfile::Online => Self::online(),
            ClassifierProfile::Offline => Self::offline(),
            ClassifierProfile::Custom => ClassifierConfig {
                name: "Custom SSVEP".to_string(),
                profile: ClassifierProfile::Custom,
                ..Self::online()
            },
        }
    }

    /// Samples per channel in one classification window
    pub fn window_samples(&self) -> usize {
        (self.window_seconds * self.sampling_rate).round() as usize
    }

    /// Validate entire configuration
    pub fn validate(&self) -> SsvepResult<()> {
        if !self.sampling_rate.is_finite() || self.sampling_rate <= 0.0 {
            return Err(SsvepError::InvalidSamplingRate {
                rate: self.sampling_rate,
                reason: "sampling rate must be positive".to_string(),
            });
        }

        if self.sampling_rate / 2.0 <= UPPER_STOPBAND_HZ {
            return Err(SsvepError::InvalidSamplingRate {
                rate: self.sampling_rate,
                reason: format!(
                    "Nyquist frequency must exceed the {}Hz upper stopband",
                    UPPER_STOPBAND_HZ
                ),
            });
        }

        self.layout.validate()?;

        if self.harmonics == 0 {
            return Err(config_error!("harmonic count must be at least 1"));
        }

        if self.num_subbands == 0 || self.num_subbands > NUM_SUBBANDS {
            return Err(config_error!(
                "sub-band count {} must be between 1 and {}",
                self.num_subbands,
                NUM_SUBBANDS
            ));
        }

        if !self.window_seconds.is_finite() || self.window_seconds <= 0.0 {
            return Err(config_error!(
                "window length must be positive, got {}s",
                self.window_seconds
            ));
        }

        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(config_error!(
                "threshold must be finite and non-negative, got {}",
                self.threshold
            ));
        }

        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> SsvepResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SsvepError::SerializationError {
            message: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> SsvepResult<Self> {
        serde_json::from_str(json).map_err(|e| SsvepError::SerializationError {
            message: format!("Failed to deserialize configuration: {}", e),
        })
    }

    /// Read and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> SsvepResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            config_error!("Failed to read {}: {}", path.display(), e)
        })?;
        let config = Self::from_json(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> SsvepResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|e| {
            config_error!("Failed to write {}: {}", path.display(), e)
        })
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClassifierConfig::default();
        assert_eq!(config.sampling_rate, 125.0);
        assert_eq!(config.layout.frequencies(), vec![7.0, 9.0, 11.0, 13.0]);
        assert_eq!(config.harmonics, 3);
        assert_eq!(config.num_subbands, 5);
        assert_eq!(config.window_samples(), 250);
        assert_eq!(config.threshold, 2.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_profiles() {
        let offline = ClassifierConfig::for_profile(ClassifierProfile::Offline);
        assert!(offline.parallel);
        assert_eq!(offline.num_subbands, ClassifierConfig::online().num_subbands);
        assert!(!ClassifierConfig::for_profile(ClassifierProfile::Online).parallel);
        assert_eq!(
            ClassifierConfig::for_profile(ClassifierProfile::Custom).profile,
            ClassifierProfile::Custom
        );
    }

    #[test]
    fn test_validation() {
        let mut config = ClassifierConfig::online();
        config.sampling_rate = 100.0;
        assert!(matches!(config.validate(), Err(SsvepError::InvalidSamplingRate { .. })));

        let mut config = ClassifierConfig::online();
        config.num_subbands = 11;
        assert!(matches!(config.validate(), Err(SsvepError::ConfigurationError { .. })));

        let mut config = ClassifierConfig::online();
        config.num_subbands = 10;
        assert!(config.validate().is_ok());

        let mut config = ClassifierConfig::online();
        config.harmonics = 0;
        assert!(config.validate().is_err());

        let mut config = ClassifierConfig::online();
        config.window_seconds = 0.0;
        assert!(config.validate().is_err());

        let mut config = ClassifierConfig::online();
        config.threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = ClassifierConfig::offline();
        let json = config.to_json().unwrap();
        assert!(json.contains("\"harmonics\": 3"));

        let restored = ClassifierConfig::from_json(&json).unwrap();
        assert_eq!(restored, config);

        assert!(matches!(
            ClassifierConfig::from_json("{ not json"),
            Err(SsvepError::SerializationError { .. })
        ));
    }

    #[test]
    fn test_load_and_save() {
        let path = std::env::temp_dir().join(format!("ssvep-config-{}.json", std::process::id()));
        let config = ClassifierConfig::online();
        config.save(&path).unwrap();
        assert_eq!(ClassifierConfig::load(&path).unwrap(), config);
        let _ = std::fs::remove_file(&path);

        assert!(ClassifierConfig::load(std::env::temp_dir().join("missing-ssvep.json")).is_err());
    }
}
