//! Stimulus layout, navigation commands and classification decisions

use crate::config_error;
use crate::error::SsvepResult;
use serde::{Deserialize, Serialize};

/// Navigation command derived from a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Up,
    Down,
    Left,
    Right,
    /// Stay in place (no confident decision)
    Hold,
}

impl Command {
    /// Unit grid offset `(dx, dy)`, with `y` growing downwards
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Command::Up => (0, -1),
            Command::Down => (0, 1),
            Command::Left => (-1, 0),
            Command::Right => (1, 0),
            Command::Hold => (0, 0),
        }
    }
}

/// Outcome of a classification: an index into the candidate list, or abstention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Index of the selected candidate frequency
    Target(usize),
    /// Best score was below the confidence threshold
    NoDecision,
}

impl Decision {
    /// Candidate index, if a target was selected
    pub fn index(&self) -> Option<usize> {
        match self {
            Decision::Target(idx) => Some(*idx),
            Decision::NoDecision => None,
        }
    }

    pub fn is_decided(&self) -> bool {
        matches!(self, Decision::Target(_))
    }
}

/// One flickering stimulus: its frequency and the command it stands for
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StimulusTarget {
    /// Flicker frequency in Hz
    pub frequency: f64,
    /// Command issued when this stimulus is selected
    pub command: Command,
}

impl StimulusTarget {
    pub fn new(frequency: f64, command: Command) -> Self {
        Self { frequency, command }
    }
}

/// Ordered candidate list; classification indices refer to positions here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusLayout {
    targets: Vec<StimulusTarget>,
}

impl StimulusLayout {
    /// Create a layout, rejecting empty, non-positive or duplicate frequencies
    pub fn new(targets: Vec<StimulusTarget>) -> SsvepResult<Self> {
        let layout = StimulusLayout { targets };
        layout.validate()?;
        Ok(layout)
    }

    /// Layout with frequencies only; every command is `Hold`
    pub fn from_frequencies(frequencies: &[f64]) -> SsvepResult<Self> {
        Self::new(
            frequencies
                .iter()
                .map(|&f| StimulusTarget::new(f, Command::Hold))
                .collect(),
        )
    }

    /// Four-way arrow layout: 7/9/11/13 Hz for up/down/left/right
    pub fn four_way() -> Self {
        StimulusLayout {
            targets: vec![
                StimulusTarget::new(7.0, Command::Up),
                StimulusTarget::new(9.0, Command::Down),
                StimulusTarget::new(11.0, Command::Left),
                StimulusTarget::new(13.0, Command::Right),
            ],
        }
    }

    /// Check the candidate list invariants
    pub fn validate(&self) -> SsvepResult<()> {
        if self.targets.is_empty() {
            return Err(config_error!("stimulus layout has no candidate frequencies"));
        }

        for (i, target) in self.targets.iter().enumerate() {
            if !target.frequency.is_finite() || target.frequency <= 0.0 {
                return Err(config_error!(
                    "candidate {} has invalid frequency {}Hz",
                    i,
                    target.frequency
                ));
            }
            if self.targets[..i].iter().any(|t| t.frequency == target.frequency) {
                return Err(config_error!(
                    "candidate frequency {}Hz appears more than once",
                    target.frequency
                ));
            }
        }

        Ok(())
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn targets(&self) -> &[StimulusTarget] {
        &self.targets
    }

    pub fn get(&self, index: usize) -> Option<&StimulusTarget> {
        self.targets.get(index)
    }

    /// Candidate frequencies in index order
    pub fn frequencies(&self) -> Vec<f64> {
        self.targets.iter().map(|t| t.frequency).collect()
    }

    /// Index of the candidate driving `command`
    pub fn index_of(&self, command: Command) -> Option<usize> {
        self.targets.iter().position(|t| t.command == command)
    }

    /// Map a decision to a command; abstention and unknown indices hold position
    pub fn command_for(&self, decision: Decision) -> Command {
        decision
            .index()
            .and_then(|idx| self.targets.get(idx))
            .map(|t| t.command)
            .unwrap_or(Command::Hold)
    }

    /// Frequency of the selected candidate
    pub fn frequency_for(&self, decision: Decision) -> Option<f64> {
        decision
            .index()
            .and_then(|idx| self.targets.get(idx))
            .map(|t| t.frequency)
    }
}

impl Default for StimulusLayout {
    fn default() -> Self {
        Self::four_way()
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Up => write!(f, "up"),
            Command::Down => write!(f, "down"),
            Command::Left => write!(f, "left"),
            Command::Right => write!(f, "right"),
            Command::Hold => write!(f, "hold"),
        }
    }
}

impl std::str::FromStr for Command {
    type Err = crate::error::SsvepError;

    fn from_str(s: &str) -> SsvepResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "u" => Ok(Command::Up),
            "down" | "d" => Ok(Command::Down),
            "left" | "l" => Ok(Command::Left),
            "right" | "r" => Ok(Command::Right),
            "hold" | "h" => Ok(Command::Hold),
            other => Err(config_error!("unknown command '{}'", other)),
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Target(idx) => write!(f, "target {}", idx),
            Decision::NoDecision => write!(f, "no decision"),
        }
    }
}
