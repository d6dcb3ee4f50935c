/// source.rs — Backend source adapters and their snapshot cells
///
/// An adapter performs one round trip per `fetch()` and returns the typed
/// collection or a `FetchError`; it never retries (the next tick is the
/// retry). The matching `Snapshot` cell is owned by whoever consumes the
/// schedule: it keeps the last good value, records the last error, and
/// discards outcomes older than the newest one already applied.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::models::{ExchangePosition, LogEntry, PositionFeed, QueueSnapshot, Signal};
use crate::scheduler::Tick;
use crate::stats::StatusFilter;
use crate::transport::{self, fetch_data, Request, Transport};

// ── Endpoints ─────────────────────────────────────────────────────────────

pub const SIGNALS_PATH:        &str = "/api/signals";
pub const SIGNALS_UPDATE_PATH: &str = "/api/signals/update";
pub const POSITIONS_PATH:      &str = "/api/okx/positions";
pub const OKX_STATUS_PATH:     &str = "/api/okx/status";
pub const QUEUE_STATUS_PATH:   &str = "/api/queue/status";
pub const LOGS_PATH:           &str = "/api/logs";
pub const HISTORY_PATH:        &str = "/api/history";

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<Self::Output, FetchError>;
}

/// Virtual signals. Asks the backend to re-price first, then reads them.
pub struct SignalSource {
    transport: Arc<dyn Transport>,
}

impl SignalSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl SourceAdapter for SignalSource {
    type Output = Vec<Signal>;

    fn name(&self) -> &'static str {
        "signals"
    }

    async fn fetch(&self) -> Result<Vec<Signal>, FetchError> {
        // Re-pricing is best effort.
        if let Err(e) = transport::command(self.transport.as_ref(), Request::post(SIGNALS_UPDATE_PATH)).await {
            warn!("signal re-price failed, reading last prices: {e}");
        }
        fetch_data(self.transport.as_ref(), Request::get(SIGNALS_PATH)).await
    }
}

/// Exchange positions plus the connection flag.
pub struct PositionSource {
    transport: Arc<dyn Transport>,
}

#[derive(Deserialize)]
struct OkxStatus {
    connected: bool,
}

impl PositionSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl SourceAdapter for PositionSource {
    type Output = PositionFeed;

    fn name(&self) -> &'static str {
        "positions"
    }

    async fn fetch(&self) -> Result<PositionFeed, FetchError> {
        let t = self.transport.as_ref();
        let (positions, status) = tokio::join!(
            fetch_data::<Vec<ExchangePosition>>(t, Request::get(POSITIONS_PATH)),
            fetch_data::<OkxStatus>(t, Request::get(OKX_STATUS_PATH)),
        );
        let connected = match status {
            Ok(s) => Some(s.connected),
            Err(e) => {
                debug!("okx status unavailable: {e}");
                None
            }
        };
        Ok(PositionFeed { positions: positions?, connected })
    }
}

/// Admission-control queue.
pub struct QueueSource {
    transport: Arc<dyn Transport>,
}

impl QueueSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl SourceAdapter for QueueSource {
    type Output = QueueSnapshot;

    fn name(&self) -> &'static str {
        "queue"
    }

    async fn fetch(&self) -> Result<QueueSnapshot, FetchError> {
        fetch_data(self.transport.as_ref(), Request::get(QUEUE_STATUS_PATH)).await
    }
}

/// Most recent backend log lines.
pub struct LogSource {
    transport: Arc<dyn Transport>,
    limit:     usize,
}

impl LogSource {
    pub fn new(transport: Arc<dyn Transport>, limit: usize) -> Self {
        Self { transport, limit }
    }
}

#[async_trait]
impl SourceAdapter for LogSource {
    type Output = Vec<LogEntry>;

    fn name(&self) -> &'static str {
        "logs"
    }

    async fn fetch(&self) -> Result<Vec<LogEntry>, FetchError> {
        let path = format!("{LOGS_PATH}?limit={}", self.limit);
        fetch_data(self.transport.as_ref(), Request::get(path)).await
    }
}

/// Closed signals, newest first as the backend returns them. Fetched on
/// demand rather than on a schedule.
pub struct HistorySource {
    transport: Arc<dyn Transport>,
    limit:     usize,
    status:    StatusFilter,
}

impl HistorySource {
    pub fn new(transport: Arc<dyn Transport>, limit: usize, status: StatusFilter) -> Self {
        Self { transport, limit, status }
    }

    fn path(&self) -> String {
        match self.status.as_query() {
            Some(status) => format!("{HISTORY_PATH}?limit={}&status={status}", self.limit),
            None => format!("{HISTORY_PATH}?limit={}", self.limit),
        }
    }
}

#[async_trait]
impl SourceAdapter for HistorySource {
    type Output = Vec<Signal>;

    fn name(&self) -> &'static str {
        "history"
    }

    async fn fetch(&self) -> Result<Vec<Signal>, FetchError> {
        fetch_data(self.transport.as_ref(), Request::get(self.path())).await
    }
}

// ── Snapshot cell ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// New value stored.
    Updated,
    /// Fetch failed; previous value kept, error recorded.
    Failed,
    /// Older than the newest applied outcome; ignored.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    name:       &'static str,
    value:      Option<T>,
    last_error: Option<String>,
    last_seq:   u64,
    updated_at: Option<DateTime<Utc>>,
}

impl<T> Snapshot<T> {
    pub fn new(name: &'static str) -> Self {
        Self { name, value: None, last_error: None, last_seq: 0, updated_at: None }
    }

    /// Apply one scheduler outcome, stamping successes with `now`.
    pub fn apply(&mut self, tick: Tick<T>, now: DateTime<Utc>) -> Applied {
        if tick.seq <= self.last_seq {
            debug!("{}: dropping stale #{} (have #{})", self.name, tick.seq, self.last_seq);
            return Applied::Stale;
        }
        self.last_seq = tick.seq;
        match tick.outcome {
            Ok(value) => {
                self.value = Some(value);
                self.last_error = None;
                self.updated_at = Some(now);
                Applied::Updated
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Applied::Failed
            }
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// At least one outcome, good or bad, has been applied.
    pub fn settled(&self) -> bool {
        self.last_seq > 0
    }

    pub fn has_data(&self) -> bool {
        self.value.is_some()
    }
}
