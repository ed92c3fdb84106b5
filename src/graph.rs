//! Graph-query collaborator surface.
//!
//! The monitoring server also exposes its data through a graph query
//! endpoint. As with the address-space protocol, the wire format is not
//! reimplemented here: a transport performs the out-of-band CSRF-token
//! handshake when connecting, and a session executes query text against the
//! schema. Query string composition stays with the caller; this module only
//! types the responses the vibration workflow consumes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{DaqError, DaqResult};
use crate::record::{Axis, WaveformRecord};

/// Capability: establish a query session against a graph endpoint.
///
/// Implementors perform the CSRF-token handshake against the endpoint URL
/// before the session is usable; that exchange is transport detail.
#[async_trait]
pub trait GraphTransport: Send + Sync {
    /// The session type this transport produces.
    type Session: GraphSession;

    /// Connects and completes the token handshake.
    async fn connect(&self, url: &str) -> DaqResult<Self::Session>;
}

/// Capability: one established query session.
#[async_trait]
pub trait GraphSession: Send + Sync {
    /// Executes query text and returns the structured result document.
    async fn execute(&self, query: &str) -> DaqResult<serde_json::Value>;
}

/// The `vibrationArray` selection of the device schema.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VibrationArray {
    /// Declared sample count.
    pub num_samples: usize,
    /// Raw acceleration samples in signed device counts.
    pub raw_samples: Vec<f64>,
    /// Sample rate of the burst [Hz].
    pub sample_rate: f64,
    /// Full-scale range [g].
    pub format_range: f64,
    /// Axis name (`X`, `Y` or `Z`).
    pub axis: String,
}

impl VibrationArray {
    /// Converts the response into the shared waveform record type, checking
    /// the declared count against the payload.
    pub fn into_record(self) -> DaqResult<WaveformRecord> {
        if self.num_samples != self.raw_samples.len() {
            return Err(DaqError::Decode(format!(
                "sample count {} does not match {} raw samples",
                self.num_samples,
                self.raw_samples.len()
            )));
        }
        Ok(WaveformRecord {
            raw_samples: self.raw_samples,
            sample_rate: self.sample_rate,
            format_range: self.format_range,
            axis: self.axis.parse::<Axis>()?,
            trailer: Vec::new(),
        })
    }
}

fn device_field<'a>(document: &'a serde_json::Value, field: &str) -> DaqResult<&'a serde_json::Value> {
    document
        .pointer(&format!("/deviceManager/device/{field}"))
        .ok_or_else(|| DaqError::Decode(format!("missing deviceManager.device.{field}")))
}

/// Extracts the `vibrationTimestampHistory` list from a query result.
pub fn parse_timestamp_history(document: &serde_json::Value) -> DaqResult<Vec<DateTime<Utc>>> {
    let list = device_field(document, "vibrationTimestampHistory")?
        .as_array()
        .ok_or_else(|| DaqError::Decode("vibrationTimestampHistory is not a list".into()))?;
    list.iter()
        .map(|entry| {
            let text = entry
                .as_str()
                .ok_or_else(|| DaqError::Decode("timestamp is not a string".into()))?;
            DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| DaqError::Decode(format!("bad timestamp {text:?}: {err}")))
        })
        .collect()
}

/// Extracts and types the `vibrationArray` selection from a query result.
pub fn parse_vibration_array(document: &serde_json::Value) -> DaqResult<VibrationArray> {
    let value = device_field(document, "vibrationArray")?;
    serde_json::from_value(value.clone())
        .map_err(|err| DaqError::Decode(format!("vibrationArray: {err}")))
}
