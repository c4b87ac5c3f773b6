//! SSVEP-Processing: filter-bank canonical correlation analysis
//!
//! Reference signals, Chebyshev sub-band filters, CCA scoring, fusion and
//! the FBCCA classifier built from them.

pub mod reference;
pub mod filters;
pub mod cca;
pub mod fusion;
pub mod metrics;
pub mod config;
pub mod classifier;

pub use reference::{reference_signal, reference_set};
pub use filters::{
    BiquadSection, SosFilter, SubbandEdges, SubbandFilter, FilterBank,
    SUBBAND_TABLE, NUM_SUBBANDS,
};
pub use cca::{CorrelationScorer, CcaScorer};
pub use fusion::{fusion_weights, argmax, decide, decide_forced, CorrelationMatrix, DEFAULT_THRESHOLD};
pub use metrics::ClassificationMetrics;
pub use config::{ClassifierConfig, ClassifierProfile};
pub use classifier::{FbccaClassifier, Classification};
