//! Fetches vibration bursts from a (mock) monitoring server, conditions
//! them and prints the dominant frequency of each burst.
//!
//! Against real hardware the `MockHistoryServer` would be replaced by a
//! transport implementing `HistoryTransport` for the actual protocol stack;
//! everything downstream is identical.
//!
//! ```sh
//! cargo run --example vibration_analysis
//! ```

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use tracing::info;
use vibration_daq::dsp::{perform_highpass_filtering, perform_windowed_fft};
use vibration_daq::endpoint::mock::MockHistoryServer;
use vibration_daq::history::{read_history, sensor_path, TimeRange};
use vibration_daq::record::decode_series;
use vibration_daq::session::ResilientSession;
use vibration_daq::{AcquisitionConfig, SpectrumMode, WindowShape};

const MAC_ID: &str = "ab:cd:12:34";
const SAMPLE_RATE: f64 = 800.0;
const HIGHPASS_CUTOFF_HZ: f64 = 6.0;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AcquisitionConfig::default();
    let path = sensor_path(2, MAC_ID, &["accelerationPack"]);
    let start = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default();

    // A day of hourly bursts carrying a 120 Hz tone, as the device would
    // historize them.
    let server = MockHistoryServer::new();
    server
        .add_synthetic_waveforms(
            &path,
            24,
            start,
            Duration::hours(1),
            SAMPLE_RATE,
            512,
            120.0,
            16.0,
        )
        .await;

    let mut session = ResilientSession::open_with_config(server, &config).await?;
    let series = read_history(
        &mut session,
        &path,
        TimeRange::between(start, start + Duration::days(1)),
        config.total_limit,
        config.per_request_cap,
    )
    .await?;
    session.close().await;

    info!(bursts = series.len(), "retrieval finished");

    for (timestamp, value) in series.timestamps.iter().zip(&series.values) {
        let record = decode_series(std::slice::from_ref(value))?.remove(0);
        let acceleration = record.to_g();
        let conditioned =
            perform_highpass_filtering(&acceleration, record.sample_rate, HIGHPASS_CUTOFF_HZ)?;
        let spectrum = perform_windowed_fft(
            &conditioned,
            record.sample_rate,
            512,
            0,
            WindowShape::Hann,
            false,
            SpectrumMode::MagnitudeRms,
        )?;
        if let Some((bin, freq)) = spectrum.peak() {
            println!(
                "{timestamp}  axis {}  peak {:.2} Hz  ({:.3} g RMS)",
                record.axis, freq, spectrum.bins[bin]
            );
        }
    }
    Ok(())
}
