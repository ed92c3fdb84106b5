//! Paginated history retrieval.
//!
//! [`read_history`] pulls the complete set of historical samples for one
//! variable within a time range, transparently paginating in bounded
//! requests through a [`ResilientSession`].
//!
//! Two retrieval modes exist, selected by whether the caller supplied a start
//! bound:
//!
//! - **Forward** (start given): the server returns pages oldest to newest;
//!   the synthetic boundary advances past the last returned sample.
//! - **Backward** (start absent): the server returns pages newest to oldest;
//!   the synthetic boundary retreats, and the accumulated result is reversed
//!   before returning so callers always see chronological order.
//!
//! Boundaries are derived from the *server* timestamp of the last sample of
//! a page, offset by one microsecond in the direction of travel. That
//! prevents re-fetching the boundary sample without skipping any sample when
//! source and server clocks disagree.
//!
//! When the endpoint returns an explicit continuation token, the token is
//! authoritative and the time bounds are left untouched; the timestamp
//! arithmetic is a fallback for endpoints that expose no cursor.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::endpoint::{Continuation, HistoryConnection, HistoryTransport, QualifiedName, Variant};
use crate::error::{DaqError, DaqResult};
use crate::session::ResilientSession;

/// Half-open time range for a retrieval. `None` bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// Oldest instant to include, if bounded.
    pub start: Option<DateTime<Utc>>,
    /// Newest instant to include, if bounded.
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Bounded on both sides.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Bounded only on the newest side; retrieval runs backward from `end`.
    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// Bounded only on the oldest side.
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// True when both bounds are present and inverted. An inverted range is
    /// a no-op retrieval, not an error.
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }
}

/// Build-once result of one variable's retrieval: two parallel sequences in
/// chronological (oldest to newest) source-timestamp order.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    /// Source timestamps, one per value.
    pub timestamps: Vec<DateTime<Utc>>,
    /// Sample payloads, one per timestamp.
    pub values: Vec<Variant>,
}

impl TimeSeries {
    /// Number of samples retrieved.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the retrieval produced no samples.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds the browse path for a sensor variable under the objects root:
/// the device's mac id followed by nested browse names, all in the vendor
/// namespace.
pub fn sensor_path(namespace: u16, mac_id: &str, browse_names: &[&str]) -> Vec<QualifiedName> {
    let mut path = Vec::with_capacity(1 + browse_names.len());
    path.push(QualifiedName::new(namespace, mac_id));
    for name in browse_names {
        path.push(QualifiedName::new(namespace, *name));
    }
    path
}

/// Retrieves the historical samples for one variable.
///
/// Issues bounded page requests of at most `min(per_request_cap, remaining)`
/// samples until the range is exhausted, the server stops continuing, or
/// `total_limit` samples have been accumulated.
///
/// # Errors
///
/// - [`DaqError::Precondition`] when `per_request_cap < 1`.
/// - [`DaqError::NotFound`] when the browse path resolves to nothing.
/// - Whatever the endpoint surfaced once the retry budget is spent.
///
/// An inverted range or an empty first page is not an error; both yield an
/// empty [`TimeSeries`].
pub async fn read_history<T: HistoryTransport>(
    session: &mut ResilientSession<T>,
    path: &[QualifiedName],
    range: TimeRange,
    total_limit: usize,
    per_request_cap: usize,
) -> DaqResult<TimeSeries> {
    if per_request_cap < 1 {
        return Err(DaqError::Precondition(
            "per_request_cap must be at least 1".into(),
        ));
    }
    if range.is_inverted() {
        return Ok(TimeSeries::default());
    }

    let owned_path = path.to_vec();
    let node = session
        .invoke(move |conn| {
            let path = owned_path.clone();
            Box::pin(async move { conn.resolve_child(&path).await })
        })
        .await?;

    let forward = range.start.is_some();
    let mut start = range.start;
    let mut end = range.end;
    let mut token: Option<Vec<u8>> = None;
    let mut series = TimeSeries::default();

    while series.len() < total_limit {
        if matches!((start, end), (Some(s), Some(e)) if s > e) {
            break;
        }
        let want =
            u32::try_from(per_request_cap.min(total_limit - series.len())).unwrap_or(u32::MAX);
        let page_node = node.clone();
        let page_token = token.clone();
        let page = session
            .invoke(move |conn| {
                let node = page_node.clone();
                let token = page_token.clone();
                Box::pin(async move {
                    conn.read_history_page(&node, start, end, want, token.as_deref())
                        .await
                })
            })
            .await?;

        let Some(last) = page.samples.last() else {
            if series.is_empty() {
                warn!(node = %node, "no data was returned");
            }
            break;
        };
        let page_first_server_ts = page.samples[0].server_ts;
        let page_last_server_ts = last.server_ts;

        for sample in page.samples {
            series.timestamps.push(sample.source_ts);
            series.values.push(sample.value);
        }
        info!(
            loaded = series.len(),
            page_first = %page_first_server_ts,
            page_last = %page_last_server_ts,
            "loaded history page"
        );

        match page.continuation {
            Continuation::Exhausted => break,
            Continuation::Token(next) => token = Some(next),
            Continuation::Unsupported => {
                // No cursor: derive the next boundary from the last server
                // timestamp, one microsecond past it in the travel direction.
                token = None;
                if forward {
                    start = Some(page_last_server_ts + Duration::microseconds(1));
                } else {
                    end = Some(page_last_server_ts - Duration::microseconds(1));
                }
            }
        }
    }

    // Backward retrieval accumulates newest first; present chronologically.
    if !forward {
        series.timestamps.reverse();
        series.values.reverse();
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_range_is_detected() {
        let early = Utc::now();
        let late = early + Duration::hours(1);
        assert!(TimeRange::between(late, early).is_inverted());
        assert!(!TimeRange::between(early, late).is_inverted());
        assert!(!TimeRange::until(early).is_inverted());
        assert!(!TimeRange::since(late).is_inverted());
    }

    #[test]
    fn sensor_path_nests_browse_names() {
        let path = sensor_path(2, "ab:cd:12:34", &["vibration", "x", "accel", "xAccelTime"]);
        assert_eq!(path.len(), 5);
        assert_eq!(path[0].name, "ab:cd:12:34");
        assert_eq!(path[4].name, "xAccelTime");
        assert!(path.iter().all(|q| q.namespace == 2));
    }
}
