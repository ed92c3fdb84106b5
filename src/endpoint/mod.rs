//! Capability traits for the node-addressable history collaborator.
//!
//! The monitoring server is reached over an address-space protocol whose wire
//! format is not this crate's concern. Everything the acquisition code needs
//! is expressed as two small capability traits, in the same spirit as a
//! hardware driver boundary:
//!
//! - [`HistoryTransport`] knows how to establish a connection to one endpoint.
//! - [`HistoryConnection`] is one live connection: resolve a browse path to a
//!   node, read one page of history, report namespace indices, disconnect.
//!
//! The single behavioral contract placed on implementors is the error
//! classification: a missing browse path must surface as
//! [`DaqError::NotFound`] so the retry policy in [`crate::session`] can
//! propagate it immediately, while transport-level faults surface as
//! [`DaqError::Transient`] or [`DaqError::Connection`] and get retried.
//!
//! # Design Philosophy
//!
//! Each trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses `DaqResult` for errors
//! - Focuses on ONE thing

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DaqResult;

pub mod mock;

/// A browse name qualified by a namespace index.
///
/// Browse paths are sequences of these, rooted at the server's objects node,
/// e.g. `ab:cd:12:34` (device namespace) followed by `vibration`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    /// Namespace index the name lives in.
    pub namespace: u16,
    /// The browse name itself.
    pub name: String,
}

impl QualifiedName {
    /// Builds a qualified name.
    pub fn new(namespace: u16, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Opaque reference to a resolved node within one endpoint's address space.
///
/// Only ever produced by [`HistoryConnection::resolve_child`] and handed back
/// to the same connection; the contents carry no meaning to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(String);

impl NodeId {
    /// Wraps an implementation-defined node identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string, for logging.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A historized value as delivered by the endpoint.
///
/// Temperature-style variables arrive as scalars; vibration variables arrive
/// as flat numeric arrays with a fixed layout that [`crate::record`] decodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// A single numeric reading.
    Scalar(f64),
    /// A flat numeric array (waveform packet, model parameters, ...).
    Array(Vec<f64>),
    /// A textual value (device tags and similar).
    Text(String),
}

/// One historical sample.
///
/// The source timestamp is when the sensor produced the sample; the server
/// timestamp is when the endpoint recorded it. Pagination boundaries are
/// always derived from the server timestamp, never the source timestamp,
/// so the two clocks disagreeing cannot skip or duplicate samples.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySample {
    /// When the sample was physically produced by the sensor.
    pub source_ts: DateTime<Utc>,
    /// When the sample was recorded/indexed by the endpoint.
    pub server_ts: DateTime<Utc>,
    /// The sample payload.
    pub value: Variant,
}

/// Continuation state returned alongside a history page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// An explicit server cursor; pass it back to resume the same read.
    Token(Vec<u8>),
    /// The server signalled that no more data exists in range.
    Exhausted,
    /// The endpoint exposes no cursor; the reader falls back to deriving a
    /// synthetic boundary from the last server timestamp.
    Unsupported,
}

/// One page of history, in the server's native order for the request
/// direction (oldest first when a start bound was given, newest first
/// otherwise).
#[derive(Debug, Clone)]
pub struct HistoryPage {
    /// The samples of this page.
    pub samples: Vec<HistorySample>,
    /// How to continue, if at all.
    pub continuation: Continuation,
}

/// Capability: establish a connection to one history endpoint.
///
/// The endpoint locator (URL, address) is the implementor's state; the
/// session layer owns the connect timeout and passes it in.
#[async_trait]
pub trait HistoryTransport: Send + Sync {
    /// The connection type this transport produces.
    type Connection: HistoryConnection;

    /// Establishes a connection.
    ///
    /// Must complete (or fail) within `timeout`; a refused endpoint or an
    /// elapsed timeout maps to [`DaqError::Connection`].
    ///
    /// [`DaqError::Connection`]: crate::error::DaqError::Connection
    async fn connect(&self, timeout: std::time::Duration) -> DaqResult<Self::Connection>;
}

/// Capability: one live connection to a history endpoint.
#[async_trait]
pub trait HistoryConnection: Send + Sync {
    /// Returns the namespace index registered for `uri` on this server.
    async fn namespace_index(&self, uri: &str) -> DaqResult<u16>;

    /// Resolves a browse path (relative to the objects root) to a node.
    ///
    /// Fails with [`DaqError::NotFound`] if any path element has no matching
    /// child; that classification is never retried.
    ///
    /// [`DaqError::NotFound`]: crate::error::DaqError::NotFound
    async fn resolve_child(&self, path: &[QualifiedName]) -> DaqResult<NodeId>;

    /// Reads one page of raw history for `node`.
    ///
    /// `max_count` bounds the page size; zero means server-chosen. When
    /// `continuation` carries a token from a previous page, the server
    /// resumes that read and the time bounds are ignored.
    async fn read_history_page(
        &self,
        node: &NodeId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        max_count: u32,
        continuation: Option<&[u8]>,
    ) -> DaqResult<HistoryPage>;

    /// Releases the connection. Must be idempotent and must swallow errors
    /// from a connection that is already dead.
    async fn disconnect(&self);
}
