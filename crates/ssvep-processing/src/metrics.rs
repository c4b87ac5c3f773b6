//! Timing of classification calls

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Performance metrics for one classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Wall time in microseconds
    pub processing_time_us: u64,
    /// Sub-bands filtered and scored
    pub subbands: usize,
    /// Candidate frequencies scored
    pub candidates: usize,
    /// Samples per channel in the window
    pub samples: usize,
}

impl ClassificationMetrics {
    /// Start timing a classification
    pub fn start_timing() -> ClassificationTimer {
        ClassificationTimer {
            start_time: Instant::now(),
            metrics: ClassificationMetrics::default(),
        }
    }

    /// Number of CCA fits the call performed
    pub fn correlations(&self) -> usize {
        self.subbands * self.candidates
    }

    /// Whether the call finished inside `budget_us`
    pub fn within_budget(&self, budget_us: u64) -> bool {
        self.processing_time_us <= budget_us
    }
}

/// Helper for timing classification calls
pub struct ClassificationTimer {
    start_time: Instant,
    metrics: ClassificationMetrics,
}

impl ClassificationTimer {
    /// Record the workload size
    pub fn set_workload(&mut self, subbands: usize, candidates: usize, samples: usize) {
        self.metrics.subbands = subbands;
        self.metrics.candidates = candidates;
        self.metrics.samples = samples;
    }

    /// Finish timing and return metrics
    pub fn finish(mut self) -> ClassificationMetrics {
        self.metrics.processing_time_us = self.start_time.elapsed().as_micros() as u64;
        self.metrics
    }
}
