//! Fixed-layout vibration waveform records.
//!
//! Vibration variables historize one flat numeric array per burst. The
//! layout is a device contract:
//!
//! ```text
//! index 0            sample count n
//! indices 1..=n      raw acceleration samples (signed counts, +/-512 full scale)
//! index n+1          sample rate [Hz]
//! index n+2          format range (full scale, +/- g)
//! index n+3          format resolution (reserved here)
//! index n+4          axis code (0/1/2 -> X/Y/Z)
//! indices n+5, n+6   reserved
//! ```
//!
//! [`WaveformRecord::decode`] turns the positional layout into named fields
//! so the contract is machine-checkable; a count mismatch or a short trailer
//! is a [`DaqError::Decode`], fatal for the variable being retrieved.

use std::str::FromStr;

use crate::endpoint::Variant;
use crate::error::{DaqError, DaqResult};

/// Raw counts corresponding to the full format range.
pub const FORMAT_DIVISOR: f64 = 512.0;

/// Trailer fields following the raw samples.
const TRAILER_LEN: usize = 6;

/// Measurement axis of a vibration burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
}

impl Axis {
    /// Decodes the numeric axis code carried in the record trailer.
    pub fn from_code(code: f64) -> DaqResult<Self> {
        match code as i64 {
            0 => Ok(Axis::X),
            1 => Ok(Axis::Y),
            2 => Ok(Axis::Z),
            other => Err(DaqError::Decode(format!("unknown axis code {other}"))),
        }
    }

    /// Lowercase browse-name form (`x`, `y`, `z`).
    pub fn browse_name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl FromStr for Axis {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" | "x" => Ok(Axis::X),
            "Y" | "y" => Ok(Axis::Y),
            "Z" | "z" => Ok(Axis::Z),
            other => Err(DaqError::Decode(format!("unknown axis {other:?}"))),
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        })
    }
}

/// One decoded vibration burst.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformRecord {
    /// Raw acceleration samples in signed device counts.
    pub raw_samples: Vec<f64>,
    /// Sample rate of the burst [Hz].
    pub sample_rate: f64,
    /// Full-scale range [g]; counts of `FORMAT_DIVISOR` map to this value.
    pub format_range: f64,
    /// Axis the burst was measured on.
    pub axis: Axis,
    /// Undocumented trailer fields, kept verbatim.
    pub trailer: Vec<f64>,
}

impl WaveformRecord {
    /// Decodes the flat-array layout.
    pub fn decode(value: &Variant) -> DaqResult<Self> {
        let Variant::Array(fields) = value else {
            return Err(DaqError::Decode(
                "waveform record must be a numeric array".into(),
            ));
        };
        if fields.len() < 1 + TRAILER_LEN {
            return Err(DaqError::Decode(format!(
                "record too short: {} fields",
                fields.len()
            )));
        }
        let declared = fields[0];
        if declared < 0.0 || declared.fract() != 0.0 {
            return Err(DaqError::Decode(format!(
                "invalid sample count {declared}"
            )));
        }
        let count = declared as usize;
        if fields.len() != 1 + count + TRAILER_LEN {
            return Err(DaqError::Decode(format!(
                "sample count {count} does not match {} fields",
                fields.len()
            )));
        }
        let raw_samples = fields[1..=count].to_vec();
        let trailer_at = |i: usize| fields[1 + count + i];
        Ok(Self {
            raw_samples,
            sample_rate: trailer_at(0),
            format_range: trailer_at(1),
            axis: Axis::from_code(trailer_at(3))?,
            trailer: vec![trailer_at(2), trailer_at(4), trailer_at(5)],
        })
    }

    /// Re-encodes the record into its flat-array layout. The inverse of
    /// [`WaveformRecord::decode`]; mocks and fixtures use it.
    pub fn to_variant(&self) -> Variant {
        let mut fields = Vec::with_capacity(1 + self.raw_samples.len() + TRAILER_LEN);
        fields.push(self.raw_samples.len() as f64);
        fields.extend_from_slice(&self.raw_samples);
        fields.push(self.sample_rate);
        fields.push(self.format_range);
        fields.push(self.trailer.first().copied().unwrap_or_default());
        fields.push(match self.axis {
            Axis::X => 0.0,
            Axis::Y => 1.0,
            Axis::Z => 2.0,
        });
        fields.push(self.trailer.get(1).copied().unwrap_or_default());
        fields.push(self.trailer.get(2).copied().unwrap_or_default());
        Variant::Array(fields)
    }

    /// Converts the raw counts to acceleration in g units.
    pub fn to_g(&self) -> Vec<f64> {
        self.raw_samples
            .iter()
            .map(|raw| raw / FORMAT_DIVISOR * self.format_range)
            .collect()
    }
}

/// Decodes every value of a retrieved series into waveform records.
///
/// A single malformed record fails the whole series; retrievals of other
/// variables are unaffected.
pub fn decode_series(values: &[Variant]) -> DaqResult<Vec<WaveformRecord>> {
    values.iter().map(WaveformRecord::decode).collect()
}
