//! Canonical correlation between an EEG window and a reference signal

use nalgebra::{DMatrix, DVector};

/// Scores how strongly two multivariate signals co-vary.
///
/// Both inputs are laid out as (variables × samples) and must have the same
/// number of samples. The result lies in `[0, 1]`; degenerate inputs score 0.
pub trait CorrelationScorer: Send + Sync {
    fn correlate(&self, x: &DMatrix<f64>, y: &DMatrix<f64>) -> f64;
}

/// First canonical correlation, computed by whitening both covariance blocks
/// with their Cholesky factors and taking the leading singular pair of the
/// whitened cross-covariance.
#[derive(Debug, Clone, Copy)]
pub struct CcaScorer {
    /// Ridge added to the diagonal of each covariance block
    pub regularization: f64,
}

impl Default for CcaScorer {
    fn default() -> Self {
        Self {
            regularization: 1e-8,
        }
    }
}

impl CcaScorer {
    pub fn new(regularization: f64) -> Self {
        Self { regularization }
    }

    /// Canonical weight vectors `(wx, wy)` of the first component
    pub fn weights(&self, x: &DMatrix<f64>, y: &DMatrix<f64>) -> Option<(DVector<f64>, DVector<f64>)> {
        if x.ncols() != y.ncols() || x.ncols() < 2 || x.nrows() == 0 || y.nrows() == 0 {
            return None;
        }
        let xs = standardize_rows(x);
        let ys = standardize_rows(y);
        self.standardized_weights(&xs, &ys)
    }

    fn standardized_weights(
        &self,
        xs: &DMatrix<f64>,
        ys: &DMatrix<f64>,
    ) -> Option<(DVector<f64>, DVector<f64>)> {
        let dof = (xs.ncols() - 1) as f64;
        let p = xs.nrows();
        let q = ys.nrows();

        let cxx = xs * xs.transpose() / dof + DMatrix::identity(p, p) * self.regularization;
        let cyy = ys * ys.transpose() / dof + DMatrix::identity(q, q) * self.regularization;
        let cxy = xs * ys.transpose() / dof;

        let lx = cxx.cholesky()?.l();
        let ly = cyy.cholesky()?.l();

        // K = Lx^-1 Cxy Ly^-T
        let left = lx.solve_lower_triangular(&cxy)?;
        let k = ly.solve_lower_triangular(&left.transpose())?.transpose();

        let svd = k.svd(true, true);
        let u = svd.u?;
        let v_t = svd.v_t?;
        let leading = svd.singular_values.argmax().0;

        let wx = lx
            .transpose()
            .solve_upper_triangular(&u.column(leading).into_owned())?;
        let wy = ly
            .transpose()
            .solve_upper_triangular(&v_t.row(leading).transpose())?;

        Some((wx, wy))
    }
}

impl CorrelationScorer for CcaScorer {
    fn correlate(&self, x: &DMatrix<f64>, y: &DMatrix<f64>) -> f64 {
        if x.ncols() != y.ncols() || x.ncols() < 2 || x.nrows() == 0 || y.nrows() == 0 {
            return 0.0;
        }

        let xs = standardize_rows(x);
        let ys = standardize_rows(y);

        let (wx, wy) = match self.standardized_weights(&xs, &ys) {
            Some(weights) => weights,
            None => return 0.0,
        };

        // Project onto the canonical directions and correlate the variates
        let u = xs.transpose() * wx;
        let v = ys.transpose() * wy;

        let rho = pearson(u.as_slice(), v.as_slice()).abs();
        if rho.is_finite() {
            rho.min(1.0)
        } else {
            0.0
        }
    }
}

/// Zero-mean, unit-variance rows; constant rows are only centered
fn standardize_rows(m: &DMatrix<f64>) -> DMatrix<f64> {
    let n = m.ncols() as f64;
    let mut out = m.clone();
    for mut row in out.row_iter_mut() {
        let mean = row.sum() / n;
        row.add_scalar_mut(-mean);
        let var = row.norm_squared() / (n - 1.0);
        let std = var.sqrt();
        if std > 0.0 && std.is_finite() {
            row /= std;
        }
    }
    out
}

/// Pearson correlation; NaN when either side has no variance
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return f64::NAN;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    cov / (var_a * var_b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::reference_signal;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use std::f64::consts::PI;

    const FS: f64 = 125.0;
    const SAMPLES: usize = 250;

    fn noise(rows: usize, cols: usize, seed: u64) -> DMatrix<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        DMatrix::from_fn(rows, cols, |_, _| normal.sample(&mut rng))
    }

    #[test]
    fn test_pearson() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        let c = [8.0, 6.0, 4.0, 2.0];
        assert_abs_diff_eq!(pearson(&a, &b), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pearson(&a, &c), -1.0, epsilon = 1e-12);
        assert!(pearson(&a, &[1.0; 4]).is_nan());
    }

    #[test]
    fn test_phase_shifted_sinusoid_is_fully_correlated() {
        // Any phase of the reference frequency lies in the sin/cos span
        let x = DMatrix::from_fn(2, SAMPLES, |ch, k| {
            let t = (k + 1) as f64 / FS;
            (2.0 * PI * 9.0 * t + 0.7 + ch as f64).sin() * (1.0 + ch as f64)
        });
        let y = reference_signal(9.0, FS, SAMPLES, 2);

        let rho = CcaScorer::default().correlate(&x, &y);
        assert_abs_diff_eq!(rho, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_wrong_frequency_scores_lower() {
        let mut x = noise(3, SAMPLES, 7) * 0.5;
        for ch in 0..3 {
            for k in 0..SAMPLES {
                let t = (k + 1) as f64 / FS;
                x[(ch, k)] += (2.0 * PI * 11.0 * t + ch as f64).sin();
            }
        }

        let scorer = CcaScorer::default();
        let matched = scorer.correlate(&x, &reference_signal(11.0, FS, SAMPLES, 3));
        let mismatched = scorer.correlate(&x, &reference_signal(7.0, FS, SAMPLES, 3));

        assert!(matched > 0.8, "matched score {}", matched);
        assert!(mismatched < matched);
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let scorer = CcaScorer::default();
        let y = reference_signal(13.0, FS, SAMPLES, 3);
        for seed in 0..5 {
            let rho = scorer.correlate(&noise(4, SAMPLES, seed), &y);
            assert!((0.0..=1.0).contains(&rho));
        }
    }

    #[test]
    fn test_degenerate_inputs_score_zero() {
        let scorer = CcaScorer::default();
        let y = reference_signal(9.0, FS, SAMPLES, 2);

        assert_eq!(scorer.correlate(&DMatrix::zeros(2, SAMPLES), &y), 0.0);
        assert_eq!(scorer.correlate(&noise(2, 100, 1), &y), 0.0);

        let with_nan = DMatrix::from_element(2, SAMPLES, f64::NAN);
        assert_eq!(scorer.correlate(&with_nan, &y), 0.0);
    }

    #[test]
    fn test_weights_shape() {
        let x = noise(3, SAMPLES, 11);
        let y = reference_signal(7.0, FS, SAMPLES, 2);
        let (wx, wy) = CcaScorer::default().weights(&x, &y).unwrap();
        assert_eq!(wx.len(), 3);
        assert_eq!(wy.len(), 4);
    }
}
