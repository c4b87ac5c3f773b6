//! Sine/cosine reference signals for CCA-based SSVEP detection
//!
//! For each candidate frequency `f` and harmonic `h = 1..=H` the reference
//! holds the rows `sin(2π·h·f·t)` and `cos(2π·h·f·t)`, with `t = k / fs` for
//! `k = 1..=samples`. The time base starts one sample after zero so that it
//! lines up with the EEG window sample times.

use nalgebra::DMatrix;
use std::f64::consts::PI;

/// Reference matrix (2·harmonics × samples) for a single frequency
pub fn reference_signal(
    frequency: f64,
    sampling_rate: f64,
    samples: usize,
    harmonics: usize,
) -> DMatrix<f64> {
    DMatrix::from_fn(2 * harmonics, samples, |row, k| {
        let harmonic = (row / 2 + 1) as f64;
        let t = (k + 1) as f64 / sampling_rate;
        let phase = 2.0 * PI * t * harmonic * frequency;
        if row % 2 == 0 {
            phase.sin()
        } else {
            phase.cos()
        }
    })
}

/// Reference set for every candidate frequency, in candidate order
pub fn reference_set(
    frequencies: &[f64],
    sampling_rate: f64,
    samples: usize,
    harmonics: usize,
) -> Vec<DMatrix<f64>> {
    frequencies
        .iter()
        .map(|&f| reference_signal(f, sampling_rate, samples, harmonics))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_reference_shape() {
        let refs = reference_set(&[7.0, 9.0, 11.0, 13.0], 125.0, 250, 3);
        assert_eq!(refs.len(), 4);
        for r in &refs {
            assert_eq!(r.shape(), (6, 250));
        }
    }

    #[test]
    fn test_first_row_is_fundamental_sine() {
        let fs = 125.0;
        let f = 9.0;
        let r = reference_signal(f, fs, 250, 1);

        for k in 0..250 {
            let t = (k + 1) as f64 / fs;
            assert_abs_diff_eq!(r[(0, k)], (2.0 * PI * f * t).sin(), epsilon = 1e-12);
            assert_abs_diff_eq!(r[(1, k)], (2.0 * PI * f * t).cos(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_time_base_is_one_based() {
        // The first sample is at t = 1/fs, so sin is not zero there
        let r = reference_signal(10.0, 100.0, 10, 1);
        assert_abs_diff_eq!(r[(0, 0)], (2.0 * PI * 0.1).sin(), epsilon = 1e-12);
        assert!(r[(0, 0)].abs() > 0.5);
    }

    #[test]
    fn test_harmonic_rows() {
        let fs = 125.0;
        let r = reference_signal(7.0, fs, 50, 3);
        let t = 5.0 / fs;
        assert_abs_diff_eq!(r[(2, 4)], (2.0 * PI * 14.0 * t).sin(), epsilon = 1e-12);
        assert_abs_diff_eq!(r[(5, 4)], (2.0 * PI * 21.0 * t).cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_regeneration_is_bit_identical() {
        let a = reference_set(&[7.0, 13.0], 125.0, 250, 3);
        let b = reference_set(&[7.0, 13.0], 125.0, 250, 3);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!(x.iter().zip(y.iter()).all(|(p, q)| p.to_bits() == q.to_bits()));
        }
    }
}
