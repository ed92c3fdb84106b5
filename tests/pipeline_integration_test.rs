//! End-to-end: retrieve waveform bursts, decode, condition, estimate spectrum.

use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use vibration_daq::dsp::{perform_highpass_filtering, perform_windowed_fft};
use vibration_daq::endpoint::mock::MockHistoryServer;
use vibration_daq::history::{read_history, sensor_path, TimeRange};
use vibration_daq::record::decode_series;
use vibration_daq::session::ResilientSession;
use vibration_daq::{SpectrumMode, WindowShape};

const SAMPLE_RATE: f64 = 800.0;
const TONE_HZ: f64 = 100.0;
const SAMPLES_PER_RECORD: usize = 512;

#[tokio::test]
async fn recovers_the_injected_tone_from_retrieved_bursts() {
    let server = MockHistoryServer::new();
    let path = sensor_path(2, "ab:cd:12:34", &["accelerationPack"]);
    let first_ts = Utc.timestamp_opt(1_600_000_000, 0).single().unwrap();
    server
        .add_synthetic_waveforms(
            &path,
            3,
            first_ts,
            Duration::hours(1),
            SAMPLE_RATE,
            SAMPLES_PER_RECORD,
            TONE_HZ,
            16.0,
        )
        .await;

    let mut session = ResilientSession::open_with_policy(
        server.clone(),
        StdDuration::from_millis(5),
        StdDuration::from_millis(5),
        3,
    )
    .await
    .expect("mock connect");

    let series = read_history(
        &mut session,
        &path,
        TimeRange::since(first_ts),
        8192,
        1024,
    )
    .await
    .expect("retrieval");
    session.close().await;

    let records = decode_series(&series.values).expect("well-formed records");
    assert_eq!(records.len(), 3);

    for record in &records {
        assert_eq!(record.sample_rate, SAMPLE_RATE);
        let acceleration = record.to_g();
        let conditioned = perform_highpass_filtering(&acceleration, record.sample_rate, 6.0)
            .expect("conditioning");
        assert_eq!(conditioned.len(), acceleration.len());

        let spectrum = perform_windowed_fft(
            &conditioned,
            record.sample_rate,
            SAMPLES_PER_RECORD,
            0,
            WindowShape::Hann,
            false,
            SpectrumMode::MagnitudeRms,
        )
        .expect("estimation");

        let (_, peak_freq) = spectrum.peak().expect("non-empty spectrum");
        assert!(
            (peak_freq - TONE_HZ).abs() < 2.0,
            "peak at {peak_freq} Hz, expected {TONE_HZ} Hz"
        );
    }
}
