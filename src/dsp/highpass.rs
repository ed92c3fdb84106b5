//! High-pass signal conditioning.
//!
//! Raw acceleration bursts carry a sensor power-on transient and a slow
//! settling drift (compressor/mechanical settling). Conditioning runs in
//! three fixed steps:
//!
//! 1. the first 6 samples are replaced by a mirrored copy of samples 13
//!    down to 8, suppressing the known power-on transient;
//! 2. an order-1 Butterworth high-pass at a fixed 3 Hz removes the settling
//!    drift;
//! 3. an order-2 Butterworth high-pass at the caller's cutoff follows.
//!
//! Each stage is zero-phase: the signal is extended with an even reflection
//! at both edges, filtered forward, then filtered again in reverse, so the
//! conditioned burst has no phase lag relative to the raw one.
//!
//! A cutoff of zero bypasses conditioning entirely. A stage whose cutoff
//! reaches the Nyquist frequency returns an all-zero burst of the same
//! length; that is the filter-everything-out policy, not an error.

use crate::error::{DaqError, DaqResult};

/// Fixed pre-filter cutoff for settling drift [Hz].
const SETTLING_CUTOFF_HZ: f64 = 3.0;

/// Samples replaced by the power-on transient correction.
const TRANSIENT_LEN: usize = 6;

/// Highest source index read by the transient correction.
const TRANSIENT_MIRROR_END: usize = 13;

#[derive(Clone, Copy)]
enum Order {
    One,
    Two,
}

/// Normalized transfer-function coefficients `(b, a)` of a digital
/// Butterworth high-pass, from the bilinear transform with frequency
/// prewarping. `a[0]` is always 1.
fn butterworth_highpass(order: Order, cutoff_hz: f64, sample_rate: f64) -> (Vec<f64>, Vec<f64>) {
    match order {
        Order::One => {
            let wc = (std::f64::consts::PI * cutoff_hz / sample_rate).tan();
            let norm = 1.0 / (1.0 + wc);
            (vec![norm, -norm], vec![1.0, (wc - 1.0) * norm])
        }
        Order::Two => {
            let w0 = 2.0 * std::f64::consts::PI * cutoff_hz / sample_rate;
            let (sin_w0, cos_w0) = w0.sin_cos();
            // Q = 1/sqrt(2): the maximally flat (Butterworth) biquad.
            let alpha = sin_w0 * std::f64::consts::FRAC_1_SQRT_2;
            let a0 = 1.0 + alpha;
            let b = vec![
                (1.0 + cos_w0) / 2.0 / a0,
                -(1.0 + cos_w0) / a0,
                (1.0 + cos_w0) / 2.0 / a0,
            ];
            let a = vec![1.0, -2.0 * cos_w0 / a0, (1.0 - alpha) / a0];
            (b, a)
        }
    }
}

/// Direct-form II transposed IIR filter over `x` with initial state `zi`.
fn lfilter(b: &[f64], a: &[f64], x: &[f64], zi: &[f64]) -> Vec<f64> {
    let n = b.len().max(a.len()) - 1;
    let coeff = |c: &[f64], i: usize| c.get(i).copied().unwrap_or(0.0);
    let mut state = zi.to_vec();
    state.resize(n, 0.0);
    let mut y = Vec::with_capacity(x.len());
    for &sample in x {
        let out = coeff(b, 0) * sample + state.first().copied().unwrap_or(0.0);
        for i in 0..n {
            let next = if i + 1 < n { state[i + 1] } else { 0.0 };
            state[i] = coeff(b, i + 1) * sample + next - coeff(a, i + 1) * out;
        }
        y.push(out);
    }
    y
}

/// Steady-state initial filter state for a unit step, so the forward and
/// reverse passes start settled instead of ringing at the edges.
fn lfilter_zi(b: &[f64], a: &[f64]) -> Vec<f64> {
    let n = b.len().max(a.len()) - 1;
    let coeff = |c: &[f64], i: usize| c.get(i).copied().unwrap_or(0.0);
    // M = I - companion(a)^T, rhs = b[1..] - a[1..] * b[0]
    let mut m = vec![vec![0.0; n]; n];
    let mut rhs = vec![0.0; n];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            let companion_t = if j == 0 {
                -coeff(a, i + 1)
            } else if j == i + 1 {
                1.0
            } else {
                0.0
            };
            *cell = if i == j { 1.0 } else { 0.0 } - companion_t;
        }
        rhs[i] = coeff(b, i + 1) - coeff(a, i + 1) * coeff(b, 0);
    }
    solve_linear(&mut m, &mut rhs);
    rhs
}

/// In-place Gaussian elimination with partial pivoting; the solution lands
/// in `rhs`. Orders here are tiny (1 or 2).
fn solve_linear(m: &mut [Vec<f64>], rhs: &mut [f64]) {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                m[i][col]
                    .abs()
                    .partial_cmp(&m[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        m.swap(col, pivot);
        rhs.swap(col, pivot);
        let diag = m[col][col];
        if diag.abs() < f64::EPSILON {
            continue;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = m[row][col] / diag;
            for k in col..n {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    for i in 0..n {
        let diag = m[i][i];
        if diag.abs() >= f64::EPSILON {
            rhs[i] /= diag;
        }
    }
}

/// Zero-phase (forward-backward) filtering with even reflection padding at
/// both edges.
fn filtfilt(b: &[f64], a: &[f64], x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let ntaps = b.len().max(a.len());
    let padlen = (3 * ntaps).min(n - 1);

    let mut extended = Vec::with_capacity(n + 2 * padlen);
    for i in (1..=padlen).rev() {
        extended.push(x[i]);
    }
    extended.extend_from_slice(x);
    for i in 1..=padlen {
        extended.push(x[n - 1 - i]);
    }

    let zi = lfilter_zi(b, a);
    let scale = |state: &[f64], by: f64| state.iter().map(|z| z * by).collect::<Vec<_>>();

    let first = extended.first().copied().unwrap_or(0.0);
    let mut forward = lfilter(b, a, &extended, &scale(&zi, first));
    forward.reverse();
    let first = forward.first().copied().unwrap_or(0.0);
    let mut backward = lfilter(b, a, &forward, &scale(&zi, first));
    backward.reverse();

    backward[padlen..padlen + n].to_vec()
}

/// One zero-phase high-pass stage.
///
/// At or above the Nyquist frequency the stage filters everything out and
/// returns zeros of the input length.
fn run_highpass_stage(data: &[f64], cutoff_hz: f64, sample_rate: f64, order: Order) -> Vec<f64> {
    if cutoff_hz >= sample_rate / 2.0 {
        return vec![0.0; data.len()];
    }
    let (b, a) = butterworth_highpass(order, cutoff_hz, sample_rate);
    filtfilt(&b, &a, data)
}

/// Conditions one acceleration burst: transient correction, fixed 3 Hz
/// order-1 pre-filter, then an order-2 high-pass at `cutoff_hz`.
///
/// `cutoff_hz == 0` bypasses conditioning and returns the input unchanged.
/// Output length always equals input length.
///
/// # Errors
///
/// [`DaqError::Precondition`] when the burst is too short for the transient
/// correction (fewer than 14 samples).
pub fn perform_highpass_filtering(
    samples: &[f64],
    sample_rate: f64,
    cutoff_hz: f64,
) -> DaqResult<Vec<f64>> {
    if cutoff_hz == 0.0 {
        return Ok(samples.to_vec());
    }
    if samples.len() <= TRANSIENT_MIRROR_END {
        return Err(DaqError::Precondition(format!(
            "burst of {} samples is too short for transient correction",
            samples.len()
        )));
    }
    let mut data = samples.to_vec();
    for i in 0..TRANSIENT_LEN {
        data[i] = samples[TRANSIENT_MIRROR_END - i];
    }
    let data = run_highpass_stage(&data, SETTLING_CUTOFF_HZ, sample_rate, Order::One);
    Ok(run_highpass_stage(&data, cutoff_hz, sample_rate, Order::Two))
}
