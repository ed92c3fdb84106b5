//! # Vibration DAQ Library
//!
//! This crate pulls time-series sensor data (vibration bursts, temperature)
//! from an industrial condition-monitoring server and turns raw bursts into
//! time-domain and frequency-domain views. The server is reachable over two
//! alternative protocols, both treated as opaque collaborators behind small
//! capability traits.
//!
//! ## Crate Structure
//!
//! The library is organized into several modules, each with a distinct
//! responsibility:
//!
//! - **`endpoint`**: capability traits for the node-addressable history
//!   collaborator, plus value types (samples, pages, continuation state) and
//!   a scripted mock server for tests and demos.
//! - **`session`**: `ResilientSession`, the connection lifecycle wrapper
//!   that retries transient failures with reconnects and a fixed backoff.
//! - **`history`**: the paginated history reader producing chronological
//!   `TimeSeries` regardless of retrieval direction.
//! - **`record`**: the fixed-layout vibration waveform decoder and g-units
//!   scaling.
//! - **`graph`**: the graph-query collaborator surface with typed vibration
//!   responses.
//! - **`dsp`**: pure numeric transforms; high-pass conditioning and windowed
//!   FFT spectral estimation.
//! - **`config`**: acquisition tuning knobs, loadable from TOML and
//!   validated.
//! - **`error`**: the crate-wide `DaqError` taxonomy.
//!
//! ## Typical flow
//!
//! ```rust,no_run
//! use vibration_daq::endpoint::mock::MockHistoryServer;
//! use vibration_daq::history::{read_history, sensor_path, TimeRange};
//! use vibration_daq::session::ResilientSession;
//!
//! # async fn example() -> vibration_daq::error::DaqResult<()> {
//! let server = MockHistoryServer::new();
//! let mut session = ResilientSession::open(server).await?;
//! let path = sensor_path(2, "ab:cd:12:34", &["accelerationPack"]);
//! let series = read_history(
//!     &mut session,
//!     &path,
//!     TimeRange::default(),
//!     8192,
//!     1024,
//! )
//! .await?;
//! session.close().await;
//! # let _ = series;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dsp;
pub mod endpoint;
pub mod error;
pub mod graph;
pub mod history;
pub mod record;
pub mod session;

pub use config::AcquisitionConfig;
pub use dsp::{perform_highpass_filtering, perform_windowed_fft, SpectrumMode, WindowShape};
pub use endpoint::{Continuation, HistoryPage, HistorySample, QualifiedName, Variant};
pub use error::{DaqError, DaqResult};
pub use history::{read_history, sensor_path, TimeRange, TimeSeries};
pub use record::{Axis, WaveformRecord};
pub use session::ResilientSession;
