//! Mock history endpoint.
//!
//! Provides a scripted, in-memory implementation of the endpoint traits for
//! testing and demos without a physical monitoring server. The mock serves
//! deterministic pages with known server timestamps, supports both the
//! explicit-cursor and the cursorless pagination styles, and can inject
//! failures to exercise the retry policy.
//!
//! # Available knobs
//!
//! - `add_series` / `add_scalar_series` - seed chronological history per node
//! - `add_synthetic_waveforms` - seed tone-plus-noise waveform records
//! - `without_cursor` - serve pages with no continuation token
//! - `fail_next` - queue errors returned by upcoming remote calls
//! - `refuse_connects` - make the next N connection attempts fail
//! - `stats` - observe connect/resolve/page counters

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::sync::Mutex;

use crate::endpoint::{
    Continuation, HistoryConnection, HistoryPage, HistorySample, HistoryTransport, NodeId,
    QualifiedName, Variant,
};
use crate::error::{DaqError, DaqResult};
use crate::record::{Axis, WaveformRecord};

/// Observed call counts, for asserting interaction patterns in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Successful connection attempts.
    pub connects: usize,
    /// Refused connection attempts.
    pub refused_connects: usize,
    /// Browse-path resolutions served.
    pub resolves: usize,
    /// History pages served (including failed calls).
    pub page_requests: usize,
    /// Connection releases observed.
    pub disconnects: usize,
}

struct MockState {
    namespaces: HashMap<String, u16>,
    nodes: HashMap<String, Vec<HistorySample>>,
    with_cursor: bool,
    fail_queue: VecDeque<DaqError>,
    refuse_connects: usize,
    stats: MockStats,
}

fn path_key(path: &[QualifiedName]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

/// Scripted in-memory history server.
///
/// Cloning is cheap; all clones share the same state, so a test can keep a
/// handle for assertions while the session under test owns another.
#[derive(Clone)]
pub struct MockHistoryServer {
    state: Arc<Mutex<MockState>>,
}

impl MockHistoryServer {
    /// Creates an empty server with explicit-cursor pagination enabled.
    pub fn new() -> Self {
        let mut namespaces = HashMap::new();
        namespaces.insert("http://opcfoundation.org/UA/".to_string(), 0);
        Self {
            state: Arc::new(Mutex::new(MockState {
                namespaces,
                nodes: HashMap::new(),
                with_cursor: true,
                fail_queue: VecDeque::new(),
                refuse_connects: 0,
                stats: MockStats::default(),
            })),
        }
    }

    /// Disables continuation tokens; pages report `Continuation::Unsupported`
    /// and the reader must fall back to timestamp arithmetic.
    pub async fn without_cursor(self) -> Self {
        self.state.lock().await.with_cursor = false;
        self
    }

    /// Registers a namespace URI and returns its index.
    pub async fn add_namespace(&self, uri: &str) -> u16 {
        let mut state = self.state.lock().await;
        let next = state.namespaces.len() as u16;
        *state.namespaces.entry(uri.to_string()).or_insert(next)
    }

    /// Seeds a node with pre-built samples. Samples must already be in
    /// chronological (oldest to newest) server-timestamp order.
    pub async fn add_series(&self, path: &[QualifiedName], samples: Vec<HistorySample>) {
        let mut state = self.state.lock().await;
        state.nodes.insert(path_key(path), samples);
    }

    /// Seeds a scalar node; source and server timestamps coincide.
    pub async fn add_scalar_series(
        &self,
        path: &[QualifiedName],
        points: Vec<(DateTime<Utc>, f64)>,
    ) {
        let samples = points
            .into_iter()
            .map(|(ts, v)| HistorySample {
                source_ts: ts,
                server_ts: ts,
                value: Variant::Scalar(v),
            })
            .collect();
        self.add_series(path, samples).await;
    }

    /// Seeds a vibration node with waveform records containing a pure tone
    /// plus uniform noise, encoded in the device's flat-array layout.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_synthetic_waveforms(
        &self,
        path: &[QualifiedName],
        records: usize,
        first_ts: DateTime<Utc>,
        spacing: Duration,
        sample_rate: f64,
        samples_per_record: usize,
        tone_hz: f64,
        format_range: f64,
    ) {
        let mut rng = rand::thread_rng();
        let mut out = Vec::with_capacity(records);
        for r in 0..records {
            let ts = first_ts + spacing * r as i32;
            let raw: Vec<f64> = (0..samples_per_record)
                .map(|i| {
                    let t = i as f64 / sample_rate;
                    let tone = (2.0 * std::f64::consts::PI * tone_hz * t).sin();
                    let noise = rng.gen_range(-0.05..0.05);
                    // Device counts: full scale maps to +/-512.
                    ((tone * 0.5 + noise) * 512.0).round()
                })
                .collect();
            let record = WaveformRecord {
                raw_samples: raw,
                sample_rate,
                format_range,
                axis: Axis::X,
                trailer: vec![0.0; 3],
            };
            out.push(HistorySample {
                source_ts: ts,
                server_ts: ts,
                value: record.to_variant(),
            });
        }
        self.add_series(path, out).await;
    }

    /// Queues errors that upcoming remote calls will return, in order.
    pub async fn fail_next(&self, errors: Vec<DaqError>) {
        self.state.lock().await.fail_queue.extend(errors);
    }

    /// Makes the next `n` connection attempts fail with a refused error.
    pub async fn refuse_connects(&self, n: usize) {
        self.state.lock().await.refuse_connects = n;
    }

    /// Snapshot of the interaction counters.
    pub async fn stats(&self) -> MockStats {
        self.state.lock().await.stats
    }
}

impl Default for MockHistoryServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryTransport for MockHistoryServer {
    type Connection = MockConnection;

    async fn connect(&self, _timeout: StdDuration) -> DaqResult<Self::Connection> {
        let mut state = self.state.lock().await;
        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            state.stats.refused_connects += 1;
            return Err(DaqError::Connection("connection refused".into()));
        }
        state.stats.connects += 1;
        Ok(MockConnection {
            state: Arc::clone(&self.state),
        })
    }
}

/// One live connection to the [`MockHistoryServer`].
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

fn decode_token(token: &[u8]) -> DaqResult<usize> {
    let bytes: [u8; 8] = token
        .try_into()
        .map_err(|_| DaqError::Transient("bad continuation token".into()))?;
    Ok(u64::from_le_bytes(bytes) as usize)
}

fn encode_token(index: usize) -> Vec<u8> {
    (index as u64).to_le_bytes().to_vec()
}

#[async_trait]
impl HistoryConnection for MockConnection {
    async fn namespace_index(&self, uri: &str) -> DaqResult<u16> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.fail_queue.pop_front() {
            return Err(err);
        }
        state
            .namespaces
            .get(uri)
            .copied()
            .ok_or_else(|| DaqError::NotFound(format!("namespace {uri}")))
    }

    async fn resolve_child(&self, path: &[QualifiedName]) -> DaqResult<NodeId> {
        let mut state = self.state.lock().await;
        state.stats.resolves += 1;
        if let Some(err) = state.fail_queue.pop_front() {
            return Err(err);
        }
        let key = path_key(path);
        if state.nodes.contains_key(&key) {
            Ok(NodeId::new(key))
        } else {
            Err(DaqError::NotFound(key))
        }
    }

    async fn read_history_page(
        &self,
        node: &NodeId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        max_count: u32,
        continuation: Option<&[u8]>,
    ) -> DaqResult<HistoryPage> {
        let mut state = self.state.lock().await;
        state.stats.page_requests += 1;
        if let Some(err) = state.fail_queue.pop_front() {
            return Err(err);
        }
        let with_cursor = state.with_cursor;
        let series = state
            .nodes
            .get(node.as_str())
            .ok_or_else(|| DaqError::NotFound(node.to_string()))?;

        // Chronological indices within the requested bounds.
        let matching: Vec<usize> = series
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                start.map_or(true, |b| s.server_ts >= b) && end.map_or(true, |b| s.server_ts <= b)
            })
            .map(|(i, _)| i)
            .collect();

        // Newest first when no start bound was given, oldest first otherwise.
        let ordered: Vec<usize> = if start.is_some() {
            matching
        } else {
            matching.into_iter().rev().collect()
        };

        let offset = match continuation {
            Some(token) if with_cursor => decode_token(token)?,
            _ => 0,
        };
        let take = if max_count == 0 {
            ordered.len()
        } else {
            max_count as usize
        };
        let page: Vec<HistorySample> = ordered
            .iter()
            .skip(offset)
            .take(take)
            .map(|&i| series[i].clone())
            .collect();

        let continuation = if !with_cursor {
            Continuation::Unsupported
        } else if offset + page.len() < ordered.len() {
            Continuation::Token(encode_token(offset + page.len()))
        } else {
            Continuation::Exhausted
        };

        Ok(HistoryPage {
            samples: page,
            continuation,
        })
    }

    async fn disconnect(&self) {
        self.state.lock().await.stats.disconnects += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(sec: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(sec, 0).single().unwrap_or_default()
    }

    fn temperature_path() -> Vec<QualifiedName> {
        vec![
            QualifiedName::new(2, "ab:cd:12:34"),
            QualifiedName::new(2, "boardTemperature"),
        ]
    }

    #[tokio::test]
    async fn serves_forward_pages_with_token_resume() {
        let server = MockHistoryServer::new();
        let path = temperature_path();
        server
            .add_scalar_series(&path, (0..5).map(|i| (ts(i), i as f64)).collect())
            .await;

        let conn = server.connect(StdDuration::from_secs(1)).await.unwrap();
        let node = conn.resolve_child(&path).await.unwrap();

        let page = conn
            .read_history_page(&node, Some(ts(0)), None, 2, None)
            .await
            .unwrap();
        assert_eq!(page.samples.len(), 2);
        assert_eq!(page.samples[0].server_ts, ts(0));
        let Continuation::Token(token) = page.continuation else {
            panic!("expected a continuation token");
        };

        let page = conn
            .read_history_page(&node, Some(ts(0)), None, 8, Some(&token))
            .await
            .unwrap();
        assert_eq!(page.samples.len(), 3);
        assert_eq!(page.continuation, Continuation::Exhausted);
    }

    #[tokio::test]
    async fn serves_backward_pages_newest_first() {
        let server = MockHistoryServer::new();
        let path = temperature_path();
        server
            .add_scalar_series(&path, (0..4).map(|i| (ts(i), i as f64)).collect())
            .await;

        let conn = server.connect(StdDuration::from_secs(1)).await.unwrap();
        let node = conn.resolve_child(&path).await.unwrap();
        let page = conn
            .read_history_page(&node, None, Some(ts(10)), 0, None)
            .await
            .unwrap();
        assert_eq!(page.samples[0].server_ts, ts(3));
        assert_eq!(page.samples[3].server_ts, ts(0));
    }

    #[tokio::test]
    async fn missing_path_resolves_to_not_found() {
        let server = MockHistoryServer::new();
        let conn = server.connect(StdDuration::from_secs(1)).await.unwrap();
        let err = conn
            .resolve_child(&[QualifiedName::new(2, "no:such:dev")])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
