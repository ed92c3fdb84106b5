//! Deterministic numeric transforms for raw sample sequences.
//!
//! No I/O happens here. [`highpass`] conditions a time-domain burst
//! (settling-artifact removal plus cascaded zero-phase high-pass filtering);
//! [`spectrum`] estimates a windowed FFT magnitude/power spectrum from the
//! conditioned burst.

pub mod highpass;
pub mod spectrum;

pub use highpass::perform_highpass_filtering;
pub use spectrum::{perform_windowed_fft, Spectrum, SpectrumMode, WindowShape};
