//! Sub-band fusion and the final decision rule

use nalgebra::{DMatrix, DVector};
use ssvep_core::Decision;

/// Default confidence threshold for real-time decisions
pub const DEFAULT_THRESHOLD: f64 = 2.5;

/// Fusion weights `w[i] = i^-1.25 + 0.25` for 1-indexed sub-band `i`
pub fn fusion_weights(num_subbands: usize) -> DVector<f64> {
    DVector::from_fn(num_subbands, |i, _| ((i + 1) as f64).powf(-1.25) + 0.25)
}

/// (sub-bands × candidates) correlation scores for one window
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    values: DMatrix<f64>,
}

impl CorrelationMatrix {
    pub fn new(values: DMatrix<f64>) -> Self {
        Self { values }
    }

    pub fn num_subbands(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_candidates(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, subband: usize, candidate: usize) -> Option<f64> {
        self.values.get((subband, candidate)).copied()
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// `score[c] = Σ_i w[i] · ρ[i, c]`
    pub fn fuse(&self) -> Vec<f64> {
        let weights = fusion_weights(self.num_subbands());
        (self.values.transpose() * weights).iter().copied().collect()
    }
}

/// Index of the largest score; ties go to the lowest index
pub fn argmax(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Forced choice, used for batch evaluation
pub fn decide_forced(scores: &[f64]) -> Decision {
    argmax(scores).map_or(Decision::NoDecision, Decision::Target)
}

/// Thresholded choice, used for real-time control
pub fn decide(scores: &[f64], threshold: f64) -> Decision {
    match argmax(scores) {
        Some(idx) if scores[idx].abs() >= threshold => Decision::Target(idx),
        _ => Decision::NoDecision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_weights_positive_and_decreasing() {
        let w = fusion_weights(10);
        assert_abs_diff_eq!(w[0], 1.25, epsilon = 1e-12);
        assert_abs_diff_eq!(w[1], 2f64.powf(-1.25) + 0.25, epsilon = 1e-12);
        for i in 0..10 {
            assert!(w[i] > 0.25);
        }
        for i in 1..10 {
            assert!(w[i] < w[i - 1]);
        }
    }

    #[test]
    fn test_fuse() {
        let rho = CorrelationMatrix::new(DMatrix::from_row_slice(2, 3, &[
            0.9, 0.2, 0.1,
            0.5, 0.4, 0.0,
        ]));
        let w = fusion_weights(2);
        let scores = rho.fuse();
        assert_eq!(scores.len(), 3);
        assert_abs_diff_eq!(scores[0], w[0] * 0.9 + w[1] * 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(scores[2], w[0] * 0.1, epsilon = 1e-12);
        assert_eq!(rho.get(1, 1), Some(0.4));
        assert_eq!(rho.get(2, 0), None);
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        assert_eq!(argmax(&[0.3, 0.7, 0.7, 0.1]), Some(1));
        assert_eq!(argmax(&[2.0, 2.0]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_threshold() {
        assert_eq!(decide(&[1.0, 2.6, 0.5], DEFAULT_THRESHOLD), Decision::Target(1));
        assert_eq!(decide(&[1.0, 2.4, 0.5], DEFAULT_THRESHOLD), Decision::NoDecision);
        assert_eq!(decide(&[2.5], DEFAULT_THRESHOLD), Decision::Target(0));
        assert_eq!(decide(&[], DEFAULT_THRESHOLD), Decision::NoDecision);
    }

    #[test]
    fn test_forced_choice_ignores_threshold() {
        assert_eq!(decide_forced(&[0.01, 0.02]), Decision::Target(1));
        assert_eq!(decide_forced(&[]), Decision::NoDecision);
    }
}
