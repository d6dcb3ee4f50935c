/// config.rs — Centralised configuration loaded from .env
///
/// Everything the monitor needs to reach the backend and pace its polling.
/// Loading happens once at startup; the dashboard borrows &AppConfig.
use anyhow::{bail, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5001";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    // ── Backend ──────────────────────────────────────────────────────
    pub api_url:           String,
    pub http_timeout_secs: u64,

    // ── Poll intervals (ms) ──────────────────────────────────────────
    pub signal_poll_ms:   u64,
    pub position_poll_ms: u64,
    pub queue_poll_ms:    u64,
    pub log_poll_ms:      u64,

    // ── Logs ─────────────────────────────────────────────────────────
    /// `limit` sent to /api/logs on every poll
    pub log_fetch_limit: usize,
    /// Entries kept in the trailing log window
    pub log_window:      usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url:           DEFAULT_API_URL.to_owned(),
            http_timeout_secs: 10,
            signal_poll_ms:    3_000,
            position_poll_ms:  3_000,
            queue_poll_ms:     5_000,
            log_poll_ms:       2_000,
            log_fetch_limit:   200,
            log_window:        100,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (after dotenv).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // ignore missing .env
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let cfg = Self {
            api_url: lookup("MONITOR_API_URL")
                .map(|s| s.trim().trim_end_matches('/').to_owned())
                .filter(|s| !s.is_empty())
                .unwrap_or(d.api_url),
            http_timeout_secs: parse_key(&lookup, "HTTP_TIMEOUT_SECS", d.http_timeout_secs)?,

            signal_poll_ms:   parse_key(&lookup, "SIGNAL_POLL_MS",   d.signal_poll_ms)?,
            position_poll_ms: parse_key(&lookup, "POSITION_POLL_MS", d.position_poll_ms)?,
            queue_poll_ms:    parse_key(&lookup, "QUEUE_POLL_MS",    d.queue_poll_ms)?,
            log_poll_ms:      parse_key(&lookup, "LOG_POLL_MS",      d.log_poll_ms)?,

            log_fetch_limit: parse_key(&lookup, "LOG_FETCH_LIMIT", d.log_fetch_limit)?,
            log_window:      parse_key(&lookup, "LOG_WINDOW",      d.log_window)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        for (key, v) in [
            ("SIGNAL_POLL_MS", self.signal_poll_ms),
            ("POSITION_POLL_MS", self.position_poll_ms),
            ("QUEUE_POLL_MS", self.queue_poll_ms),
            ("LOG_POLL_MS", self.log_poll_ms),
            ("HTTP_TIMEOUT_SECS", self.http_timeout_secs),
        ] {
            if v == 0 {
                bail!("Config key {key}: must be greater than zero");
            }
        }
        if self.log_window == 0 {
            bail!("Config key LOG_WINDOW: must be greater than zero");
        }
        Ok(())
    }

    pub fn signal_interval(&self) -> Duration {
        Duration::from_millis(self.signal_poll_ms)
    }

    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_poll_ms)
    }

    pub fn queue_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_ms)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.log_poll_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_key<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Config key {key}: {e}")),
        None => Ok(default),
    }
}
