//! Gaze patterns and stimulus waveforms for SSVEP simulation

use serde::{Deserialize, Serialize};
use ssvep_core::{Command, StimulusLayout};
use std::f64::consts::PI;

/// Luminance of a flickering stimulus at time `t`, in `[0, 1]`
pub fn stimulus_luminance(frequency: f64, time: f64) -> f64 {
    ((2.0 * PI * frequency * time).sin() + 1.0) / 2.0
}

/// Which stimulus the simulated user fixates over time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GazePattern {
    /// Looking away from every stimulus
    Idle,
    /// Fixating one stimulus
    Fixed { frequency: f64 },
    /// Switching between two stimuli every `dwell` seconds
    Alternating { first: f64, second: f64, dwell: f64 },
    /// Fixating for `on_duration`, looking away for `off_duration`
    Intermittent {
        frequency: f64,
        on_duration: f64,
        off_duration: f64,
    },
}

impl GazePattern {
    /// Fixate the stimulus bound to `command`, idle if none is
    pub fn toward(layout: &StimulusLayout, command: Command) -> Self {
        match layout.index_of(command).and_then(|idx| layout.get(idx)) {
            Some(target) => GazePattern::Fixed {
                frequency: target.frequency,
            },
            None => GazePattern::Idle,
        }
    }

    /// Gazed frequency at `time`, `None` while looking away
    pub fn frequency_at(&self, time: f64) -> Option<f64> {
        match self {
            GazePattern::Idle => None,

            GazePattern::Fixed { frequency } => Some(*frequency),

            GazePattern::Alternating { first, second, dwell } => {
                if *dwell <= 0.0 {
                    return Some(*first);
                }
                let slot = (time / dwell).floor() as i64;
                if slot.rem_euclid(2) == 0 {
                    Some(*first)
                } else {
                    Some(*second)
                }
            }

            GazePattern::Intermittent {
                frequency,
                on_duration,
                off_duration,
            } => {
                let cycle = on_duration + off_duration;
                if cycle <= 0.0 || time.rem_euclid(cycle) < *on_duration {
                    Some(*frequency)
                } else {
                    None
                }
            }
        }
    }

    /// Get pattern description
    pub fn description(&self) -> &'static str {
        match self {
            GazePattern::Idle => "Looking away",
            GazePattern::Fixed { .. } => "Steady fixation",
            GazePattern::Alternating { .. } => "Alternating fixation",
            GazePattern::Intermittent { .. } => "Intermittent fixation",
        }
    }

    /// Common presets for the four-way layout
    pub fn presets() -> Vec<(&'static str, GazePattern)> {
        vec![
            ("Rest", GazePattern::Idle),
            ("Up", GazePattern::Fixed { frequency: 7.0 }),
            ("Down", GazePattern::Fixed { frequency: 9.0 }),
            ("Left", GazePattern::Fixed { frequency: 11.0 }),
            ("Right", GazePattern::Fixed { frequency: 13.0 }),
            ("Zig-zag", GazePattern::Alternating {
                first: 9.0, second: 13.0, dwell: 3.0
            }),
            ("Distracted", GazePattern::Intermittent {
                frequency: 7.0, on_duration: 2.0, off_duration: 1.0
            }),
        ]
    }
}

impl Default for GazePattern {
    fn default() -> Self {
        GazePattern::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_range() {
        for k in 0..100 {
            let l = stimulus_luminance(9.0, k as f64 / 125.0);
            assert!((0.0..=1.0).contains(&l));
        }
        assert!((stimulus_luminance(7.0, 0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_and_idle() {
        assert_eq!(GazePattern::Fixed { frequency: 9.0 }.frequency_at(12.3), Some(9.0));
        assert_eq!(GazePattern::Idle.frequency_at(0.0), None);
    }

    #[test]
    fn test_alternating() {
        let pattern = GazePattern::Alternating { first: 7.0, second: 11.0, dwell: 2.0 };
        assert_eq!(pattern.frequency_at(0.5), Some(7.0));
        assert_eq!(pattern.frequency_at(2.5), Some(11.0));
        assert_eq!(pattern.frequency_at(4.0), Some(7.0));
    }

    #[test]
    fn test_intermittent() {
        let pattern = GazePattern::Intermittent { frequency: 13.0, on_duration: 2.0, off_duration: 1.0 };
        assert_eq!(pattern.frequency_at(1.0), Some(13.0));
        assert_eq!(pattern.frequency_at(2.5), None);
        assert_eq!(pattern.frequency_at(3.1), Some(13.0));
    }

    #[test]
    fn test_toward_command() {
        let layout = StimulusLayout::four_way();
        assert_eq!(GazePattern::toward(&layout, Command::Left), GazePattern::Fixed { frequency: 11.0 });
        assert_eq!(GazePattern::toward(&layout, Command::Hold), GazePattern::Idle);
    }

    #[test]
    fn test_presets_have_descriptions() {
        for (name, pattern) in GazePattern::presets() {
            assert!(!name.is_empty());
            assert!(!pattern.description().is_empty());
        }
    }
}
