//! Windowed FFT spectral estimation.
//!
//! [`perform_windowed_fft`] averages the squared magnitude of overlapped,
//! windowed FFT segments (Welch-style), normalized by the window's coherent
//! gain so a sinusoid's amplitude survives the windowing. The averaged power
//! is then presented in one of four scaling modes.
//!
//! For a real-valued signal only the first `ceil(window/2)` bins are
//! retained, with all bins except DC and the top retained bin doubled to
//! conserve energy under the one-sided convention.

use num_complex::Complex;
use rustfft::FftPlanner;
use std::str::FromStr;

use crate::error::{DaqError, DaqResult};

/// Window shape used for segmenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowShape {
    /// Hann (raised cosine) window.
    Hann,
    /// Hamming window.
    Hamming,
    /// Blackman window.
    Blackman,
    /// Rectangular (no taper) window.
    Rectangular,
}

impl WindowShape {
    /// Window coefficients of length `size`.
    pub fn coefficients(&self, size: usize) -> Vec<f64> {
        let term = |i: usize, k: f64| {
            if size > 1 {
                (k * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos()
            } else {
                1.0
            }
        };
        (0..size)
            .map(|i| match self {
                WindowShape::Hann => 0.5 - 0.5 * term(i, 2.0),
                WindowShape::Hamming => 0.54 - 0.46 * term(i, 2.0),
                WindowShape::Blackman => 0.42 - 0.5 * term(i, 2.0) + 0.08 * term(i, 4.0),
                WindowShape::Rectangular => 1.0,
            })
            .collect()
    }
}

impl FromStr for WindowShape {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hann" | "hanning" => Ok(WindowShape::Hann),
            "hamming" => Ok(WindowShape::Hamming),
            "blackman" => Ok(WindowShape::Blackman),
            "rectangular" | "boxcar" => Ok(WindowShape::Rectangular),
            other => Err(DaqError::Precondition(format!(
                "unknown window shape {other:?}"
            ))),
        }
    }
}

/// Final scaling applied to the averaged power estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumMode {
    /// Linear power spectrum.
    LinearPower,
    /// Log power spectrum, `10 * log10(power)`.
    LogPower,
    /// RMS magnitude spectrum, `sqrt(power)`.
    MagnitudeRms,
    /// Peak magnitude spectrum, `sqrt(2 * power)`.
    MagnitudePeak,
}

impl FromStr for SpectrumMode {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lin" => Ok(SpectrumMode::LinearPower),
            "log" => Ok(SpectrumMode::LogPower),
            "magnitudeRMS" => Ok(SpectrumMode::MagnitudeRms),
            "magnitudePeak" => Ok(SpectrumMode::MagnitudePeak),
            other => Err(DaqError::Precondition(format!(
                "unknown spectrum mode {other:?}"
            ))),
        }
    }
}

/// A one-to-one indexed pair of spectrum bins and their frequencies.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Scaled spectrum values, one per frequency bin.
    pub bins: Vec<f64>,
    /// Bin center frequencies [Hz], rounded to two decimals.
    pub frequencies: Vec<f64>,
}

impl Spectrum {
    /// Index and frequency of the strongest bin, skipping DC.
    pub fn peak(&self) -> Option<(usize, f64)> {
        self.bins
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| (i, self.frequencies[i]))
    }
}

/// Removes the least-squares linear trend from a segment, separately for the
/// real and imaginary parts.
fn detrend_linear(segment: &mut [Complex<f64>]) {
    let n = segment.len();
    if n < 2 {
        return;
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let denom: f64 = (0..n).map(|i| (i as f64 - x_mean).powi(2)).sum();
    let mean = segment.iter().sum::<Complex<f64>>() / nf;
    let slope = segment
        .iter()
        .enumerate()
        .map(|(i, v)| (*v - mean) * (i as f64 - x_mean))
        .sum::<Complex<f64>>()
        / denom;
    for (i, v) in segment.iter_mut().enumerate() {
        *v -= mean + slope * (i as f64 - x_mean);
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Windowed FFT over a complex signal.
///
/// A signal with no imaginary component anywhere is treated as real and
/// gets the one-sided convention (first `ceil(window/2)` bins,
/// energy-conserving doubling); otherwise the full spectrum is returned.
pub fn perform_windowed_fft_complex(
    signal: &[Complex<f64>],
    sample_rate: f64,
    window_size: usize,
    overlap: usize,
    shape: WindowShape,
    detrend: bool,
    mode: SpectrumMode,
) -> DaqResult<Spectrum> {
    if window_size == 0 {
        return Err(DaqError::Precondition("window size must be positive".into()));
    }
    if overlap >= window_size {
        return Err(DaqError::Precondition(format!(
            "overlap {overlap} must be smaller than window size {window_size}"
        )));
    }

    let one_sided = signal.iter().all(|value| value.im == 0.0);
    let window = shape.coefficients(window_size);
    let coherent_gain = window.iter().sum::<f64>() / window_size as f64;

    // Zero-pad a signal shorter than one window.
    let mut padded;
    let signal = if signal.len() < window_size {
        padded = signal.to_vec();
        padded.resize(window_size, Complex::new(0.0, 0.0));
        padded.as_slice()
    } else {
        signal
    };

    let stride = window_size - overlap;
    let segments = (signal.len() - overlap) / stride;
    let fft = FftPlanner::new().plan_fft_forward(window_size);

    let mut power_sum = vec![0.0; window_size];
    let mut buffer = vec![Complex::new(0.0, 0.0); window_size];
    for k in 0..segments {
        buffer.copy_from_slice(&signal[k * stride..k * stride + window_size]);
        if detrend {
            detrend_linear(&mut buffer);
        }
        for (value, w) in buffer.iter_mut().zip(&window) {
            *value *= *w;
        }
        fft.process(&mut buffer);
        let norm = window_size as f64 * coherent_gain;
        for (acc, value) in power_sum.iter_mut().zip(&buffer) {
            *acc += (*value / norm).norm_sqr();
        }
    }
    for value in &mut power_sum {
        *value /= segments as f64;
    }

    let stop = if one_sided {
        let stop = (window_size as f64 / 2.0).ceil() as usize;
        // Double everything between DC and the last retained bin.
        for value in power_sum.iter_mut().take(stop.saturating_sub(1)).skip(1) {
            *value *= 2.0;
        }
        stop
    } else {
        window_size
    };
    power_sum.truncate(stop);

    let frequencies = (0..stop)
        .map(|i| round2(sample_rate / window_size as f64 * i as f64))
        .collect();
    let bins = power_sum
        .into_iter()
        .map(|p| match mode {
            SpectrumMode::LinearPower => p,
            SpectrumMode::LogPower => 10.0 * p.log10(),
            SpectrumMode::MagnitudeRms => p.sqrt(),
            SpectrumMode::MagnitudePeak => (2.0 * p).sqrt(),
        })
        .collect();

    Ok(Spectrum { bins, frequencies })
}

/// Windowed FFT magnitude/power estimation over a real signal.
///
/// # Errors
///
/// [`DaqError::Precondition`] when `overlap >= window_size` or the window
/// size is zero.
pub fn perform_windowed_fft(
    signal: &[f64],
    sample_rate: f64,
    window_size: usize,
    overlap: usize,
    shape: WindowShape,
    detrend: bool,
    mode: SpectrumMode,
) -> DaqResult<Spectrum> {
    let complex: Vec<Complex<f64>> = signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
    perform_windowed_fft_complex(
        &complex,
        sample_rate,
        window_size,
        overlap,
        shape,
        detrend,
        mode,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, amplitude: f64, sample_rate: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn overlap_not_smaller_than_window_is_rejected() {
        let signal = tone(50.0, 1.0, 1024.0, 2048);
        for overlap in [1024, 2000] {
            let err = perform_windowed_fft(
                &signal,
                1024.0,
                1024,
                overlap,
                WindowShape::Hann,
                false,
                SpectrumMode::LinearPower,
            )
            .unwrap_err();
            assert!(matches!(err, DaqError::Precondition(_)));
        }
    }

    #[test]
    fn unknown_mode_and_window_names_are_rejected() {
        assert!("magnitudeRMS".parse::<SpectrumMode>().is_ok());
        assert!(matches!(
            "power".parse::<SpectrumMode>(),
            Err(DaqError::Precondition(_))
        ));
        assert!("hann".parse::<WindowShape>().is_ok());
        assert!(matches!(
            "kaiser".parse::<WindowShape>(),
            Err(DaqError::Precondition(_))
        ));
    }

    #[test]
    fn bin_aligned_sinusoid_recovers_rms_amplitude() {
        let sample_rate = 1024.0;
        let amplitude = 3.0;
        // 64 Hz falls exactly on bin 64 of a 1024-point window.
        let signal = tone(64.0, amplitude, sample_rate, 1024);
        let spectrum = perform_windowed_fft(
            &signal,
            sample_rate,
            1024,
            0,
            WindowShape::Hann,
            false,
            SpectrumMode::MagnitudeRms,
        )
        .expect("valid arguments");

        let (peak_bin, peak_freq) = spectrum.peak().expect("non-empty spectrum");
        assert_eq!(peak_bin, 64);
        assert_eq!(peak_freq, 64.0);
        let expected = amplitude / 2.0_f64.sqrt();
        let measured = spectrum.bins[peak_bin];
        assert!(
            (measured - expected).abs() / expected < 0.01,
            "peak RMS {measured} vs expected {expected}"
        );
    }

    #[test]
    fn peak_mode_recovers_peak_amplitude() {
        let sample_rate = 1024.0;
        let signal = tone(128.0, 2.0, sample_rate, 1024);
        let spectrum = perform_windowed_fft(
            &signal,
            sample_rate,
            1024,
            512,
            WindowShape::Rectangular,
            false,
            SpectrumMode::MagnitudePeak,
        )
        .expect("valid arguments");
        let (peak_bin, _) = spectrum.peak().expect("non-empty spectrum");
        let measured = spectrum.bins[peak_bin];
        assert!(
            (measured - 2.0).abs() / 2.0 < 0.01,
            "peak amplitude {measured} vs expected 2.0"
        );
    }

    #[test]
    fn one_sided_spectrum_has_ceil_half_bins_and_rounded_axis() {
        let signal = tone(10.0, 1.0, 100.0, 300);
        let spectrum = perform_windowed_fft(
            &signal,
            100.0,
            256,
            128,
            WindowShape::Hann,
            true,
            SpectrumMode::LinearPower,
        )
        .expect("valid arguments");
        assert_eq!(spectrum.bins.len(), 128);
        assert_eq!(spectrum.frequencies.len(), 128);
        // 100/256 * 1 = 0.390625 -> 0.39
        assert_eq!(spectrum.frequencies[1], 0.39);
    }

    #[test]
    fn short_signal_is_zero_padded_to_one_window() {
        let signal = tone(16.0, 1.0, 128.0, 40);
        let spectrum = perform_windowed_fft(
            &signal,
            128.0,
            128,
            0,
            WindowShape::Hann,
            false,
            SpectrumMode::LinearPower,
        )
        .expect("valid arguments");
        assert_eq!(spectrum.bins.len(), 64);
    }

    #[test]
    fn detrend_removes_linear_ramp_energy() {
        let sample_rate = 256.0;
        let ramp: Vec<f64> = (0..256).map(|i| 0.5 + i as f64 * 0.01).collect();
        let spectrum = perform_windowed_fft(
            &ramp,
            sample_rate,
            256,
            0,
            WindowShape::Hann,
            true,
            SpectrumMode::LinearPower,
        )
        .expect("valid arguments");
        assert!(spectrum.bins.iter().sum::<f64>() < 1e-10);
    }

    #[test]
    fn complex_input_keeps_the_full_spectrum() {
        let signal: Vec<Complex<f64>> = (0..64)
            .map(|i| Complex::new(0.0, 1.0) * Complex::from_polar(1.0, 0.3 * i as f64))
            .collect();
        let spectrum = perform_windowed_fft_complex(
            &signal,
            64.0,
            64,
            0,
            WindowShape::Rectangular,
            false,
            SpectrumMode::LinearPower,
        )
        .expect("valid arguments");
        assert_eq!(spectrum.bins.len(), 64);
    }
}
