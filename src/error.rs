//! Custom error types for the crate.
//!
//! This module defines the primary error type, `DaqError`, shared by the
//! acquisition client and the signal-processing pipeline. Using the
//! `thiserror` crate, it provides a centralized and consistent way to handle
//! the different failure classes that matter to callers.
//!
//! ## Error taxonomy
//!
//! - **`NotFound`**: a browse path resolved to no node. This is a
//!   deterministic query-shape error, not a transient fault; the retry
//!   machinery in [`crate::session`] propagates it immediately instead of
//!   reconnecting.
//! - **`Connection`**: the endpoint refused or timed out while establishing a
//!   connection. The retry machinery waits a fixed backoff before the next
//!   attempt when it sees this class during a reconnect.
//! - **`Transient`**: any other remote failure (timeout mid-call, reset,
//!   generic server fault). Retried with reconnect up to the retry budget.
//! - **`Precondition`**: invalid arguments (zero page cap, overlap not
//!   smaller than the window, ...). Fatal, never retried.
//! - **`Decode`**: a malformed record payload. Fatal for the variable being
//!   retrieved; sibling retrievals are unaffected.
//! - **`Config`**: wraps errors from the `config` crate when loading
//!   acquisition settings from a file.
//!
//! By using `#[from]` where an underlying error type exists, `DaqError` works
//! seamlessly with the `?` operator throughout the crate.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type DaqResult<T> = std::result::Result<T, DaqError>;

/// Error type shared by the acquisition client and the DSP pipeline.
#[derive(Error, Debug)]
pub enum DaqError {
    /// A browse path matched no child node. Never retried.
    #[error("no such node: {0}")]
    NotFound(String),

    /// Connection establishment was refused or timed out.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A remote call failed for a reason that may clear up on retry.
    #[error("transient endpoint failure: {0}")]
    Transient(String),

    /// Caller-supplied arguments violate a documented precondition.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// A record payload did not match its fixed layout.
    #[error("malformed record payload: {0}")]
    Decode(String),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Semantic configuration error caught during validation.
    #[error("configuration validation error: {0}")]
    Configuration(String),
}

impl DaqError {
    /// True for the non-retryable "no such child/path" classification.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DaqError::NotFound(_))
    }

    /// True when a (re)connect was refused or timed out.
    pub fn is_connection(&self) -> bool {
        matches!(self, DaqError::Connection(_))
    }
}
