//! Chebyshev Type I sub-band filter bank
//!
//! Each sub-band is a band-pass filter whose lower edge comes from
//! [`SUBBAND_TABLE`] and whose upper edge is fixed at 50 Hz (passband) and
//! 60 Hz (stopband). The order is chosen so that the passband ripple stays
//! within 3 dB and the stopband is attenuated by at least 40 dB, then the
//! filter is designed with 0.5 dB ripple at that order. Filters are stored as
//! cascaded biquad sections and applied forward and backward (zero phase).

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use ssvep_core::{EegBatch, EegWindow, SsvepError, SsvepResult};
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Upper passband edge shared by every sub-band (Hz)
pub const UPPER_PASSBAND_HZ: f64 = 50.0;
/// Upper stopband edge shared by every sub-band (Hz)
pub const UPPER_STOPBAND_HZ: f64 = 60.0;
/// Largest passband ripple accepted during order selection (dB)
pub const ORDER_PASSBAND_RIPPLE_DB: f64 = 3.0;
/// Smallest stopband attenuation accepted during order selection (dB)
pub const ORDER_STOPBAND_ATTENUATION_DB: f64 = 40.0;
/// Passband ripple of the designed filters (dB)
pub const DESIGN_RIPPLE_DB: f64 = 0.5;

/// Lower band edges of one sub-band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubbandEdges {
    /// Lower passband edge (Hz)
    pub passband_low: f64,
    /// Lower stopband edge (Hz)
    pub stopband_low: f64,
}

impl SubbandEdges {
    const fn new(passband_low: f64, stopband_low: f64) -> Self {
        Self {
            passband_low,
            stopband_low,
        }
    }

    /// Passband edges `[low, high]` in Hz
    pub fn passband(&self) -> [f64; 2] {
        [self.passband_low, UPPER_PASSBAND_HZ]
    }

    /// Stopband edges `[low, high]` in Hz
    pub fn stopband(&self) -> [f64; 2] {
        [self.stopband_low, UPPER_STOPBAND_HZ]
    }

    /// Midpoint of the passband (Hz)
    pub fn passband_center(&self) -> f64 {
        (self.passband_low + UPPER_PASSBAND_HZ) / 2.0
    }
}

/// Sub-band design table, index 0 is the widest band
pub const SUBBAND_TABLE: [SubbandEdges; 10] = [
    SubbandEdges::new(6.0, 4.0),
    SubbandEdges::new(8.0, 6.0),
    SubbandEdges::new(10.0, 6.0),
    SubbandEdges::new(16.0, 10.0),
    SubbandEdges::new(22.0, 16.0),
    SubbandEdges::new(28.0, 22.0),
    SubbandEdges::new(34.0, 28.0),
    SubbandEdges::new(40.0, 34.0),
    SubbandEdges::new(43.0, 37.0),
    SubbandEdges::new(46.0, 40.0),
];

/// Number of sub-bands the table defines
pub const NUM_SUBBANDS: usize = SUBBAND_TABLE.len();

/// Single biquad section (2nd order), `a0` normalized to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadSection {
    // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadSection {
    /// Gain at DC
    fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::EPSILON {
            0.0
        } else {
            (self.b0 + self.b1 + self.b2) / den
        }
    }

    /// Transposed direct form II state after a unit step has settled
    fn step_state(&self) -> [f64; 2] {
        let det = 1.0 + self.a1 + self.a2;
        if det.abs() < f64::EPSILON {
            return [0.0, 0.0];
        }
        let r0 = self.b1 - self.a1 * self.b0;
        let r1 = self.b2 - self.a2 * self.b0;
        [(r0 + r1) / det, ((1.0 + self.a1) * r1 - self.a2 * r0) / det]
    }

    /// Filter `samples` in place starting from `state`
    fn run(&self, samples: &mut [f64], mut state: [f64; 2]) {
        for sample in samples.iter_mut() {
            let x = *sample;
            let y = self.b0 * x + state[0];
            state[0] = self.b1 * x - self.a1 * y + state[1];
            state[1] = self.b2 * x - self.a2 * y;
            *sample = y;
        }
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = z_inv2 * self.b2 + z_inv * self.b1 + self.b0;
        let den = z_inv2 * self.a2 + z_inv * self.a1 + 1.0;
        num / den
    }
}

/// IIR filter built from cascaded biquad sections
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<BiquadSection>,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadSection>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[BiquadSection] {
        &self.sections
    }

    /// Order of the equivalent single transfer function
    pub fn order(&self) -> usize {
        2 * self.sections.len()
    }

    /// Edge padding used by [`SosFilter::filtfilt`]:
    /// `3 * (max(len(b), len(a)) - 1)` of the equivalent transfer function
    pub fn pad_len(&self) -> usize {
        3 * self.order()
    }

    /// Causal single pass with zero initial state
    pub fn filter(&self, input: &[f64]) -> Vec<f64> {
        let mut output = input.to_vec();
        for section in &self.sections {
            section.run(&mut output, [0.0, 0.0]);
        }
        output
    }

    /// Zero-phase forward-backward filtering with odd-symmetric padding
    pub fn filtfilt(&self, input: &[f64]) -> SsvepResult<Vec<f64>> {
        let pad = self.pad_len();
        if input.len() <= pad {
            return Err(SsvepError::InsufficientSamples {
                available: input.len(),
                required: pad + 1,
            });
        }

        let mut extended = odd_extension(input, pad);

        let x0 = extended[0];
        self.run_from_steady_state(&mut extended, x0);
        extended.reverse();

        let y0 = extended[0];
        self.run_from_steady_state(&mut extended, y0);
        extended.reverse();

        Ok(extended[pad..extended.len() - pad].to_vec())
    }

    /// Magnitude response at `frequency` Hz for sampling rate `fs`
    pub fn magnitude(&self, frequency: f64, fs: f64) -> f64 {
        let omega = 2.0 * PI * frequency / fs;
        let z_inv = Complex64::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
            .norm()
    }

    /// Runs every section with its state scaled as if `level` had been
    /// applied forever, so a constant input produces no start-up transient.
    fn run_from_steady_state(&self, samples: &mut [f64], level: f64) {
        let mut scale = 1.0;
        for section in &self.sections {
            let state = section.step_state();
            section.run(samples, [state[0] * scale * level, state[1] * scale * level]);
            scale *= section.dc_gain();
        }
    }
}

/// Extend `x` by `pad` samples at each end, mirrored through the end points
fn odd_extension(x: &[f64], pad: usize) -> Vec<f64> {
    let n = x.len();
    let first = x[0];
    let last = x[n - 1];

    let mut extended = Vec::with_capacity(n + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
    extended.extend_from_slice(x);
    extended.extend((1..=pad).map(|i| 2.0 * last - x[n - 1 - i]));
    extended
}

/// Minimum Chebyshev Type I band-pass order meeting the ripple/attenuation
/// targets. Edges are normalized to Nyquist. Returns the order and the
/// natural frequencies, which equal the passband edges.
pub fn chebyshev1_order(
    passband: [f64; 2],
    stopband: [f64; 2],
    passband_ripple_db: f64,
    stopband_attenuation_db: f64,
) -> SsvepResult<(usize, [f64; 2])> {
    let in_unit = |w: f64| w > 0.0 && w < 1.0;
    if !passband.iter().chain(stopband.iter()).all(|&w| in_unit(w)) {
        return Err(SsvepError::FilterDesign {
            reason: format!(
                "band edges {:?}/{:?} must lie strictly between 0 and Nyquist",
                passband, stopband
            ),
        });
    }
    if !(stopband[0] < passband[0] && passband[0] < passband[1] && passband[1] < stopband[1]) {
        return Err(SsvepError::FilterDesign {
            reason: format!(
                "stopband {:?} must enclose passband {:?}",
                stopband, passband
            ),
        });
    }

    // Pre-warp to the analog domain
    let pass = passband.map(|w| (PI * w / 2.0).tan());
    let stop = stopband.map(|w| (PI * w / 2.0).tan());

    // Equivalent lowpass stopband edge, the more demanding side wins
    let natural = stop
        .iter()
        .map(|&s| ((s * s - pass[0] * pass[1]) / (s * (pass[0] - pass[1]))).abs())
        .fold(f64::INFINITY, f64::min);

    let gstop = 10f64.powf(0.1 * stopband_attenuation_db.abs());
    let gpass = 10f64.powf(0.1 * passband_ripple_db.abs());
    let discrimination = ((gstop - 1.0) / (gpass - 1.0)).sqrt().acosh();

    let order = (discrimination / natural.acosh()).ceil();
    if !order.is_finite() || order < 1.0 {
        return Err(SsvepError::FilterDesign {
            reason: format!("order selection diverged for passband {:?}", passband),
        });
    }

    Ok((order as usize, passband))
}

/// Design a digital Chebyshev Type I band-pass filter.
///
/// `order` is the lowpass prototype order (the band-pass has twice as many
/// poles); `edges` are normalized to Nyquist.
pub fn chebyshev1_bandpass(order: usize, ripple_db: f64, edges: [f64; 2]) -> SsvepResult<SosFilter> {
    if order == 0 {
        return Err(SsvepError::FilterDesign {
            reason: "filter order must be at least 1".to_string(),
        });
    }
    if !(edges[0] > 0.0 && edges[0] < edges[1] && edges[1] < 1.0) {
        return Err(SsvepError::FilterDesign {
            reason: format!("invalid band-pass edges {:?}", edges),
        });
    }

    let n = order as f64;

    // Analog lowpass prototype, unit cutoff, no zeros
    let eps = (10f64.powf(0.1 * ripple_db) - 1.0).sqrt();
    let mu = (1.0 / eps).asinh() / n;
    let prototype: Vec<Complex64> = (0..order)
        .map(|i| {
            let m = 1.0 - n + 2.0 * i as f64;
            -Complex64::new(mu, PI * m / (2.0 * n)).sinh()
        })
        .collect();

    let mut gain = prototype
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (-p))
        .re;
    if order % 2 == 0 {
        gain /= (1.0 + eps * eps).sqrt();
    }

    // Pre-warp the edges (bilinear transform with fs = 2)
    let fs = 2.0;
    let warped = edges.map(|w| 2.0 * fs * (PI * w / fs).tan());
    let bandwidth = warped[1] - warped[0];
    let center = (warped[0] * warped[1]).sqrt();

    // Lowpass to band-pass: each prototype pole splits in two, `order` zeros at s = 0
    let mut analog_poles = Vec::with_capacity(2 * order);
    for &p in &prototype {
        let scaled = p * (bandwidth / 2.0);
        let root = (scaled * scaled - center * center).sqrt();
        analog_poles.push(scaled + root);
        analog_poles.push(scaled - root);
    }
    let analog_gain = gain * bandwidth.powi(order as i32);

    // Bilinear transform: s = 0 zeros map to z = 1, zeros at infinity to z = -1
    let fs2 = Complex64::new(2.0 * fs, 0.0);
    let poles: Vec<Complex64> = analog_poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    let pole_term = analog_poles
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));
    let digital_gain = (fs2.powi(order as i32) / pole_term).re * analog_gain;

    let sections = pair_sections(&poles, order)?;
    let mut sos: Vec<BiquadSection> = sections
        .into_iter()
        .map(|(a1, a2, _)| BiquadSection {
            b0: 1.0,
            b1: 0.0,
            b2: -1.0,
            a1,
            a2,
        })
        .collect();

    sos[0].b0 *= digital_gain;
    sos[0].b2 *= digital_gain;

    Ok(SosFilter::new(sos))
}

/// Group `2 * order` digital poles into denominators `(a1, a2, radius)`,
/// poles nearest the unit circle last.
fn pair_sections(poles: &[Complex64], order: usize) -> SsvepResult<Vec<(f64, f64, f64)>> {
    let tol = 1e-10;
    let upper: Vec<Complex64> = poles.iter().copied().filter(|p| p.im > tol).collect();
    let mut real: Vec<f64> = poles
        .iter()
        .filter(|p| p.im.abs() <= tol)
        .map(|p| p.re)
        .collect();

    if 2 * upper.len() + real.len() != 2 * order {
        return Err(SsvepError::FilterDesign {
            reason: "poles do not form conjugate pairs".to_string(),
        });
    }

    // (a1, a2, largest pole radius)
    let mut sections: Vec<(f64, f64, f64)> = upper
        .iter()
        .map(|p| (-2.0 * p.re, p.norm_sqr(), p.norm()))
        .collect();

    real.sort_by(|a, b| a.total_cmp(b));
    for pair in real.chunks(2) {
        sections.push((
            -(pair[0] + pair[1]),
            pair[0] * pair[1],
            pair[0].abs().max(pair[1].abs()),
        ));
    }

    sections.sort_by(|a, b| a.2.total_cmp(&b.2));
    Ok(sections)
}

/// One designed sub-band filter
#[derive(Debug, Clone)]
pub struct SubbandFilter {
    /// Index into [`SUBBAND_TABLE`]
    pub index: usize,
    /// Band edges
    pub edges: SubbandEdges,
    /// Lowpass prototype order chosen during design
    pub prototype_order: usize,
    /// Designed filter
    pub sos: SosFilter,
}

impl SubbandFilter {
    /// Design sub-band `index` for sampling rate `sampling_rate`
    pub fn design(index: usize, sampling_rate: f64) -> SsvepResult<Self> {
        let edges = *SUBBAND_TABLE
            .get(index)
            .ok_or(SsvepError::InvalidSubband {
                index,
                max: NUM_SUBBANDS - 1,
            })?;

        let nyquist = sampling_rate / 2.0;
        let wp = edges.passband().map(|f| f / nyquist);
        let ws = edges.stopband().map(|f| f / nyquist);

        let (order, wn) = chebyshev1_order(
            wp,
            ws,
            ORDER_PASSBAND_RIPPLE_DB,
            ORDER_STOPBAND_ATTENUATION_DB,
        )?;
        let sos = chebyshev1_bandpass(order, DESIGN_RIPPLE_DB, wn)?;

        debug!(
            "Designed sub-band {} ({}-{}Hz): prototype order {}, {} sections",
            index,
            edges.passband_low,
            UPPER_PASSBAND_HZ,
            order,
            sos.sections().len()
        );

        Ok(SubbandFilter {
            index,
            edges,
            prototype_order: order,
            sos,
        })
    }

    /// Zero-phase filter every channel of `window`
    pub fn apply(&self, window: &EegWindow) -> SsvepResult<EegWindow> {
        let data = window.data();
        let mut filtered = data.clone();

        for ch in 0..data.nrows() {
            let row: Vec<f64> = data.row(ch).iter().copied().collect();
            let out = self.sos.filtfilt(&row)?;
            for (s, value) in out.into_iter().enumerate() {
                filtered[(ch, s)] = value;
            }
        }

        window.with_data(filtered)
    }
}

/// Bank of sub-band filters designed once for a fixed sampling rate.
///
/// Coefficients are read-only after construction, so one bank can be shared
/// across threads.
#[derive(Debug, Clone)]
pub struct FilterBank {
    sampling_rate: f64,
    filters: Vec<SubbandFilter>,
}

impl FilterBank {
    /// Design all table entries for `sampling_rate`
    pub fn new(sampling_rate: f64) -> SsvepResult<Self> {
        if !sampling_rate.is_finite() || sampling_rate / 2.0 <= UPPER_STOPBAND_HZ {
            return Err(SsvepError::InvalidSamplingRate {
                rate: sampling_rate,
                reason: format!(
                    "Nyquist frequency must exceed the {}Hz upper stopband",
                    UPPER_STOPBAND_HZ
                ),
            });
        }

        let filters = (0..NUM_SUBBANDS)
            .map(|idx| SubbandFilter::design(idx, sampling_rate))
            .collect::<SsvepResult<Vec<_>>>()?;

        Ok(FilterBank {
            sampling_rate,
            filters,
        })
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Designed filter for a validated index
    pub fn subband(&self, index: usize) -> SsvepResult<&SubbandFilter> {
        self.filters.get(index).ok_or(SsvepError::InvalidSubband {
            index,
            max: NUM_SUBBANDS - 1,
        })
    }

    /// Missing index falls back to 0 with a warning; out of range is an error
    pub fn resolve_index(index: Option<usize>) -> SsvepResult<usize> {
        match index {
            None => {
                warn!("Missing filter index, default value (sub-band 0) will be used");
                Ok(0)
            }
            Some(idx) if idx >= NUM_SUBBANDS => Err(SsvepError::InvalidSubband {
                index: idx,
                max: NUM_SUBBANDS - 1,
            }),
            Some(idx) => Ok(idx),
        }
    }

    /// Filter one (channels × samples) window
    pub fn filter_window(&self, window: &EegWindow, index: Option<usize>) -> SsvepResult<EegWindow> {
        let idx = Self::resolve_index(index)?;
        self.check_rate(window.sampling_rate())?;
        self.subband(idx)?.apply(window)
    }

    /// Filter every trial of a batch with the same sub-band
    pub fn filter_batch(&self, batch: &EegBatch, index: Option<usize>) -> SsvepResult<EegBatch> {
        let idx = Self::resolve_index(index)?;
        self.check_rate(batch.sampling_rate())?;
        let filter = self.subband(idx)?;

        let windows = batch
            .iter()
            .map(|window| filter.apply(window))
            .collect::<SsvepResult<Vec<_>>>()?;
        EegBatch::new(windows)
    }

    fn check_rate(&self, rate: f64) -> SsvepResult<()> {
        if rate != self.sampling_rate {
            return Err(SsvepError::InvalidSamplingRate {
                rate,
                reason: format!("filter bank was designed for {}Hz", self.sampling_rate),
            });
        }
        Ok(())
    }
}
