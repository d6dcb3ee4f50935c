/// error.rs — Failure taxonomy for backend fetches and commands
///
/// Every variant is non-fatal: the caller keeps its previous snapshot and
/// surfaces the message for display. Nothing here ever panics across the
/// transport boundary.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network unreachable, connection reset, timeout.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Non-2xx HTTP status. `message` is the body's `error` field when present.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Envelope came back with `success = false`.
    #[error("backend error: {0}")]
    Backend(String),

    /// Body could not be decoded into the endpoint's schema.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return FetchError::Malformed(err.to_string());
        }
        match err.status() {
            Some(status) => FetchError::Status {
                status:  status.as_u16(),
                message: err.to_string(),
            },
            None => FetchError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}
