use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// One backend log line from `/api/logs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LogEntry {
    /// Kept as sent (`YYYY-MM-DD HH:MM:SS`); parsed on demand for sorting.
    pub timestamp: String,
    pub level:     String,
    pub message:   String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module:    Option<String>,
}

impl LogEntry {
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        timestamp::parse(&self.timestamp)
    }
}
