//! Resilient session management for the history endpoint.
//!
//! Industrial-protocol links are flaky; this module isolates every call site
//! from manual retry logic. [`ResilientSession`] owns the lifecycle of one
//! connection handle and guards each remote operation with a retry wrapper:
//!
//! - up to [`MAX_RETRIES`] guarded attempts, reconnecting between failures;
//! - a "no such child/path" error propagates immediately and is never
//!   retried, because it is a deterministic query-shape error that would
//!   loop forever or mask a caller bug;
//! - a refused reconnect waits [`RETRY_DELAY`] before the next attempt;
//! - after the guarded attempts, one final reconnect-and-invoke whose failure
//!   propagates as-is, so the real error surfaces instead of a generic
//!   retry-exhausted wrapper.
//!
//! Connections are released on all exit paths via [`ResilientSession::scoped`]
//! or an explicit [`ResilientSession::close`].

use std::collections::HashMap;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::config::AcquisitionConfig;
use crate::endpoint::{HistoryConnection, HistoryTransport};
use crate::error::{DaqError, DaqResult};

/// Bound on connection establishment.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Backoff after a refused reconnect.
pub const RETRY_DELAY: Duration = Duration::from_secs(10);
/// Guarded attempts before the final unguarded one.
pub const MAX_RETRIES: usize = 3;

/// Connection lifecycle wrapper with transparent retry/reconnect.
pub struct ResilientSession<T: HistoryTransport> {
    transport: T,
    connection: Option<T::Connection>,
    namespace_cache: HashMap<String, u16>,
    connect_timeout: Duration,
    retry_delay: Duration,
    max_retries: usize,
}

impl<T: HistoryTransport> ResilientSession<T> {
    /// Connects to the endpoint with the default policy constants.
    pub async fn open(transport: T) -> DaqResult<Self> {
        Self::open_with_policy(transport, CONNECT_TIMEOUT, RETRY_DELAY, MAX_RETRIES).await
    }

    /// Connects with policy values taken from an [`AcquisitionConfig`].
    pub async fn open_with_config(transport: T, config: &AcquisitionConfig) -> DaqResult<Self> {
        Self::open_with_policy(
            transport,
            config.connect_timeout,
            config.retry_delay,
            config.max_retries,
        )
        .await
    }

    /// Connects with explicit policy values. Tests use short delays here.
    pub async fn open_with_policy(
        transport: T,
        connect_timeout: Duration,
        retry_delay: Duration,
        max_retries: usize,
    ) -> DaqResult<Self> {
        let mut session = Self {
            transport,
            connection: None,
            namespace_cache: HashMap::new(),
            connect_timeout,
            retry_delay,
            max_retries,
        };
        session.reconnect().await?;
        Ok(session)
    }

    /// Opens a session, runs `body`, and releases the connection on every
    /// exit path, mirroring the acquire/release contract.
    pub async fn scoped<R, F>(transport: T, body: F) -> DaqResult<R>
    where
        F: for<'s> FnOnce(&'s mut ResilientSession<T>) -> BoxFuture<'s, DaqResult<R>>,
    {
        let mut session = Self::open(transport).await?;
        let result = body(&mut session).await;
        session.close().await;
        result
    }

    async fn connect(&mut self) -> DaqResult<()> {
        let connection = match timeout(self.connect_timeout, self.transport.connect(self.connect_timeout)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DaqError::Connection(format!(
                    "connect timed out after {:?}",
                    self.connect_timeout
                )))
            }
        };
        self.connection = Some(connection);
        Ok(())
    }

    /// Tears down the current connection, if any, and establishes a new one.
    pub async fn reconnect(&mut self) -> DaqResult<()> {
        self.close().await;
        self.connect().await
    }

    /// Releases the connection. Idempotent; errors from an already-dead
    /// connection are swallowed by the endpoint contract.
    pub async fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.disconnect().await;
        }
    }

    /// Executes one remote operation under the retry policy.
    ///
    /// The operation is a callable over the live connection, boxed so any
    /// call shape fits:
    ///
    /// ```rust,ignore
    /// let page = session
    ///     .invoke(|conn| Box::pin(conn.read_history_page(&node, start, end, 64, None)))
    ///     .await?;
    /// ```
    pub async fn invoke<R, F>(&mut self, operation: F) -> DaqResult<R>
    where
        F: for<'c> Fn(&'c T::Connection) -> BoxFuture<'c, DaqResult<R>>,
    {
        for _ in 0..self.max_retries {
            if let Some(connection) = self.connection.as_ref() {
                match operation(connection).await {
                    Ok(value) => return Ok(value),
                    Err(err) if err.is_not_found() => return Err(err),
                    Err(err) => {
                        warn!(error = %err, "endpoint call failed, reconnecting");
                    }
                }
            }
            if let Err(err) = self.reconnect().await {
                if err.is_connection() {
                    warn!(
                        error = %err,
                        "connection refused, retrying in {:?}", self.retry_delay
                    );
                    sleep(self.retry_delay).await;
                } else {
                    return Err(err);
                }
            }
        }
        // Final attempt is unguarded so the underlying error surfaces.
        self.reconnect().await?;
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| DaqError::Connection("no connection after reconnect".into()))?;
        operation(connection).await
    }

    /// Returns the namespace index for `uri`, memoized per session.
    pub async fn namespace_index(&mut self, uri: &str) -> DaqResult<u16> {
        if let Some(&index) = self.namespace_cache.get(uri) {
            return Ok(index);
        }
        let owned = uri.to_string();
        let index = self
            .invoke(move |conn| {
                let uri = owned.clone();
                Box::pin(async move { conn.namespace_index(&uri).await })
            })
            .await?;
        self.namespace_cache.insert(uri.to_string(), index);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::mock::MockHistoryServer;
    use crate::endpoint::QualifiedName;

    const FAST: Duration = Duration::from_millis(5);

    async fn fast_session(server: MockHistoryServer) -> ResilientSession<MockHistoryServer> {
        ResilientSession::open_with_policy(server, FAST, FAST, MAX_RETRIES)
            .await
            .expect("mock connect")
    }

    #[tokio::test]
    async fn not_found_propagates_without_reconnect() {
        let server = MockHistoryServer::new();
        let handle = server.clone();
        let mut session = fast_session(server).await;

        let missing = vec![QualifiedName::new(2, "no:such:dev")];
        let err = session
            .invoke(|conn| {
                let path = missing.clone();
                Box::pin(async move { conn.resolve_child(&path).await })
            })
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        let stats = handle.stats().await;
        assert_eq!(stats.connects, 1, "no reconnect may be attempted");
        assert_eq!(stats.resolves, 1, "exactly one attempt");
    }

    #[tokio::test]
    async fn transient_failures_recover_within_budget() {
        let server = MockHistoryServer::new();
        server
            .add_namespace("http://www.iqunet.com")
            .await;
        server
            .fail_next(vec![
                DaqError::Transient("reset".into()),
                DaqError::Transient("reset".into()),
            ])
            .await;
        let handle = server.clone();
        let mut session = fast_session(server).await;

        let index = session.namespace_index("http://www.iqunet.com").await.expect("third attempt succeeds");
        assert_eq!(index, 1);
        // Initial connect plus one reconnect per failed attempt.
        assert_eq!(handle.stats().await.connects, 3);
    }

    #[tokio::test]
    async fn refused_reconnect_waits_then_recovers() {
        let server = MockHistoryServer::new();
        server.add_namespace("http://www.iqunet.com").await;
        server
            .fail_next(vec![DaqError::Transient("reset".into())])
            .await;
        let handle = server.clone();
        let mut session = fast_session(server).await;
        // The reconnect after the first failed attempt is refused once.
        handle.refuse_connects(1).await;

        let index = session.namespace_index("http://www.iqunet.com").await.expect("recovers after backoff");
        assert_eq!(index, 1);
        let stats = handle.stats().await;
        assert_eq!(stats.refused_connects, 1);
        assert!(stats.connects >= 2);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_underlying_error() {
        let server = MockHistoryServer::new();
        // Every guarded attempt and the final unguarded one fail.
        server
            .fail_next(
                (0..MAX_RETRIES + 1)
                    .map(|_| DaqError::Transient("fault".into()))
                    .collect(),
            )
            .await;
        let handle = server.clone();
        let mut session = fast_session(server).await;

        let err = session
            .invoke(|conn| Box::pin(async move { conn.namespace_index("urn:none").await }))
            .await
            .unwrap_err();
        // The final attempt's own error must surface, not a wrapper.
        assert!(matches!(err, DaqError::Transient(_)));
        assert_eq!(handle.stats().await.connects, 1 + MAX_RETRIES + 1);
    }

    #[tokio::test]
    async fn namespace_index_is_memoized() {
        let server = MockHistoryServer::new();
        server.add_namespace("http://www.iqunet.com").await;
        let mut session = fast_session(server).await;

        let first = session.namespace_index("http://www.iqunet.com").await.expect("lookup");
        let second = session.namespace_index("http://www.iqunet.com").await.expect("cached");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let server = MockHistoryServer::new();
        let handle = server.clone();
        let mut session = fast_session(server).await;
        session.close().await;
        session.close().await;
        assert_eq!(handle.stats().await.disconnects, 1);
    }

    #[tokio::test]
    async fn scoped_releases_the_connection_on_success() {
        let server = MockHistoryServer::new();
        server.add_namespace("http://www.iqunet.com").await;
        let handle = server.clone();

        let index = ResilientSession::scoped(server, |session| {
            Box::pin(async move { session.namespace_index("http://www.iqunet.com").await })
        })
        .await
        .expect("body succeeds");

        assert_eq!(index, 1);
        assert_eq!(handle.stats().await.disconnects, 1);
    }

    #[tokio::test]
    async fn scoped_releases_the_connection_when_the_body_fails() {
        let server = MockHistoryServer::new();
        let handle = server.clone();

        let result: DaqResult<()> = ResilientSession::scoped(server, |_session| {
            Box::pin(async move { Err(DaqError::Precondition("abort".into())) })
        })
        .await;

        assert!(matches!(result, Err(DaqError::Precondition(_))));
        assert_eq!(handle.stats().await.disconnects, 1);
    }
}
