//! Filter-bank CCA classifier
//!
//! Each window is split into sub-bands, every sub-band is correlated with the
//! reference set of every candidate, and the weighted sum over sub-bands
//! picks the candidate. Real-time classification abstains below the
//! configured threshold; batch classification always picks.

use crate::cca::{CcaScorer, CorrelationScorer};
use crate::config::ClassifierConfig;
use crate::filters::FilterBank;
use crate::fusion::{argmax, decide, CorrelationMatrix};
use crate::metrics::ClassificationMetrics;
use crate::reference::reference_set;
use nalgebra::DMatrix;
use rayon::prelude::*;
use ssvep_core::{
    config_error, Command, Decision, EegBatch, EegSource, EegWindow, SsvepError, SsvepResult,
};
use tracing::{debug, info};

/// Result of one real-time classification
#[derive(Debug, Clone)]
pub struct Classification {
    /// Selected candidate or abstention
    pub decision: Decision,
    /// Fused score per candidate
    pub scores: Vec<f64>,
    /// Per sub-band, per candidate correlations
    pub correlations: CorrelationMatrix,
    pub metrics: ClassificationMetrics,
}

impl Classification {
    /// Highest fused score
    pub fn best_score(&self) -> Option<f64> {
        argmax(&self.scores).map(|idx| self.scores[idx])
    }
}

/// FBCCA classifier with its filter bank designed up front
#[derive(Debug, Clone)]
pub struct FbccaClassifier<S = CcaScorer> {
    config: ClassifierConfig,
    filter_bank: FilterBank,
    scorer: S,
}

impl FbccaClassifier<CcaScorer> {
    /// Create a classifier with the default CCA scorer
    pub fn new(config: ClassifierConfig) -> SsvepResult<Self> {
        Self::with_scorer(config, CcaScorer::default())
    }
}

impl<S: CorrelationScorer> FbccaClassifier<S> {
    /// Create a classifier with a custom correlation scorer
    pub fn with_scorer(config: ClassifierConfig, scorer: S) -> SsvepResult<Self> {
        config.validate()?;
        let filter_bank = FilterBank::new(config.sampling_rate)?;

        info!(
            "FBCCA classifier ready: {}Hz, {} candidates, {} sub-bands, {} harmonics",
            config.sampling_rate,
            config.layout.len(),
            config.num_subbands,
            config.harmonics
        );

        Ok(FbccaClassifier {
            config,
            filter_bank,
            scorer,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn filter_bank(&self) -> &FilterBank {
        &self.filter_bank
    }

    /// Correlation of every (sub-band, candidate) pair for one window
    pub fn correlation_matrix(&self, window: &EegWindow) -> SsvepResult<CorrelationMatrix> {
        self.check_window(window)?;

        let refs = reference_set(
            &self.config.layout.frequencies(),
            self.config.sampling_rate,
            window.samples_per_channel(),
            self.config.harmonics,
        );

        let score_subband = |idx: usize| -> SsvepResult<Vec<f64>> {
            let filtered = self.filter_bank.filter_window(window, Some(idx))?;
            Ok(refs
                .iter()
                .map(|reference| self.scorer.correlate(filtered.data(), reference))
                .collect())
        };

        let rows: Vec<Vec<f64>> = if self.config.parallel {
            (0..self.config.num_subbands)
                .into_par_iter()
                .map(score_subband)
                .collect::<SsvepResult<_>>()?
        } else {
            (0..self.config.num_subbands)
                .map(score_subband)
                .collect::<SsvepResult<_>>()?
        };

        Ok(CorrelationMatrix::new(DMatrix::from_fn(
            rows.len(),
            refs.len(),
            |i, c| rows[i][c],
        )))
    }

    /// Fused score per candidate
    pub fn scores(&self, window: &EegWindow) -> SsvepResult<Vec<f64>> {
        Ok(self.correlation_matrix(window)?.fuse())
    }

    /// Real-time classification with the confidence threshold
    pub fn classify_window(&self, window: &EegWindow) -> SsvepResult<Classification> {
        let mut timer = ClassificationMetrics::start_timing();

        let correlations = self.correlation_matrix(window)?;
        let scores = correlations.fuse();
        let decision = decide(&scores, self.config.threshold);

        timer.set_workload(
            correlations.num_subbands(),
            correlations.num_candidates(),
            window.samples_per_channel(),
        );
        let metrics = timer.finish();

        debug!(
            "FBCCA scores {:?} -> {} ({}us)",
            scores, decision, metrics.processing_time_us
        );

        Ok(Classification {
            decision,
            scores,
            correlations,
            metrics,
        })
    }

    /// Real-time decision only
    pub fn classify(&self, window: &EegWindow) -> SsvepResult<Decision> {
        Ok(self.classify_window(window)?.decision)
    }

    /// Real-time decision mapped to a navigation command
    pub fn command_for(&self, window: &EegWindow) -> SsvepResult<Command> {
        let decision = self.classify(window)?;
        Ok(self.config.layout.command_for(decision))
    }

    /// Read the configured window length from `source` and classify it
    pub fn classify_source<E: EegSource + ?Sized>(&self, source: &mut E) -> SsvepResult<Classification> {
        let window = source.get_window(self.config.window_seconds)?;
        self.classify_window(&window)
    }

    /// Forced-choice classification of every trial, no threshold
    pub fn classify_batch(&self, batch: &EegBatch) -> SsvepResult<Vec<usize>> {
        let classify_trial = |window: &EegWindow| -> SsvepResult<usize> {
            let scores = self.scores(window)?;
            argmax(&scores).ok_or_else(|| config_error!("no candidate frequencies to score"))
        };

        let picks: Vec<usize> = if self.config.parallel {
            batch
                .windows()
                .par_iter()
                .map(classify_trial)
                .collect::<SsvepResult<_>>()?
        } else {
            batch.iter().map(classify_trial).collect::<SsvepResult<_>>()?
        };

        debug!("Batch of {} trials classified: {:?}", batch.len(), picks);
        Ok(picks)
    }

    fn check_window(&self, window: &EegWindow) -> SsvepResult<()> {
        if window.sampling_rate() != self.config.sampling_rate {
            return Err(SsvepError::InvalidSamplingRate {
                rate: window.sampling_rate(),
                reason: format!(
                    "classifier is configured for {}Hz",
                    self.config.sampling_rate
                ),
            });
        }

        // Every used sub-band must be able to pad the window
        let required = (0..self.config.num_subbands)
            .map(|idx| self.filter_bank.subband(idx).map(|f| f.sos.pad_len() + 1))
            .collect::<SsvepResult<Vec<_>>>()?
            .into_iter()
            .max()
            .unwrap_or(0);
        if window.samples_per_channel() < required {
            return Err(SsvepError::InsufficientSamples {
                available: window.samples_per_channel(),
                required,
            });
        }

        Ok(())
    }
}
