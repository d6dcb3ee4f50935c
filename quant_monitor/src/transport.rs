/// transport.rs — Request/response plumbing to the bot backend
///
/// Every endpoint answers with the same envelope:
///
///   { "success": bool, "data"?: T, "error"?: string, "message"?: string }
///
/// `Transport::send` performs one round trip and folds every failure mode
/// (connect error, timeout, non-2xx, undecodable body) into a `FetchError`.
/// Typed decoding of `data` happens in `fetch_data`, so schema violations land
/// in the same error channel as network failures.
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;

// ── Request descriptor ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Path plus query, e.g. `/api/logs?limit=200`.
    pub path:   String,
    pub body:   Option<Value>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::Get, path: path.into(), body: None }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self { method: Method::Post, path: path.into(), body: None }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// `METHOD /path`, used for logging and fake routing.
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

// ── Response envelope ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data:    Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error:   Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), ..Default::default() }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), ..Default::default() }
    }

    /// `success = false` becomes `FetchError::Backend`.
    pub fn check(self) -> Result<Self, FetchError> {
        if self.success {
            return Ok(self);
        }
        let reason = self
            .error
            .or(self.message)
            .unwrap_or_else(|| "request failed".to_owned());
        Err(FetchError::Backend(reason))
    }
}

/// Acknowledgement of a fire-and-confirm command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandAck {
    pub message: Option<String>,
    pub data:    Option<Value>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, req: Request) -> Result<Envelope, FetchError>;
}

/// One round trip, then decode `data` into the endpoint schema.
pub async fn fetch_data<T>(transport: &dyn Transport, req: Request) -> Result<T, FetchError>
where
    T: DeserializeOwned,
{
    let route = req.route();
    let env = transport.send(req).await?.check()?;
    let data = env
        .data
        .ok_or_else(|| FetchError::Malformed(format!("{route}: envelope has no data")))?;
    serde_json::from_value(data).map_err(|e| FetchError::Malformed(format!("{route}: {e}")))
}

/// One round trip for a command endpoint; only `success` matters.
pub async fn command(transport: &dyn Transport, req: Request) -> Result<CommandAck, FetchError> {
    let env = transport.send(req).await?.check()?;
    Ok(CommandAck { message: env.message, data: env.data })
}

// ── reqwest implementation ────────────────────────────────────────────────

pub struct HttpTransport {
    client:   Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("HTTP client build failed")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, req: Request) -> Result<Envelope, FetchError> {
        let url = format!("{}{}", self.base_url, req.path);
        debug!("{} {}", req.method, url);

        let builder = match req.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let builder = match &req.body {
            Some(body) => builder.json(body),
            None => builder.header(CONTENT_TYPE, "application/json"),
        };

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope>(&body)
                .ok()
                .and_then(|env| env.error)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(FetchError::Status { status: status.as_u16(), message });
        }

        serde_json::from_str::<Envelope>(&body)
            .map_err(|e| FetchError::Malformed(format!("{}: {e}", req.route())))
    }
}

// ── In-memory transport for tests ─────────────────────────────────────────

#[cfg(test)]
pub mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::{Envelope, Request, Transport};
    use crate::error::FetchError;

    type Reply = Result<Envelope, FetchError>;

    /// Scripted backend. Each route holds a queue of replies; the last reply
    /// of a route is sticky. Unknown routes answer with a transport error.
    #[derive(Default)]
    pub struct FakeTransport {
        routes: Mutex<HashMap<String, VecDeque<Reply>>>,
        delays: Mutex<HashMap<String, VecDeque<Duration>>>,
        calls:  Mutex<Vec<Request>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful reply carrying `data`.
        pub fn reply(&self, route: &str, data: Value) -> &Self {
            self.push(route, Ok(Envelope::ok(data)))
        }

        /// Queue a `success = false` reply.
        pub fn reject(&self, route: &str, error: &str) -> &Self {
            self.push(route, Ok(Envelope::failed(error)))
        }

        /// Queue a transport-level failure.
        pub fn fail(&self, route: &str, error: FetchError) -> &Self {
            self.push(route, Err(error))
        }

        pub fn push(&self, route: &str, reply: Reply) -> &Self {
            self.routes
                .lock()
                .unwrap()
                .entry(route.to_owned())
                .or_default()
                .push_back(reply);
            self
        }

        /// Delay the next call of `route` by `d` (tokio time).
        pub fn delay_next(&self, route: &str, d: Duration) -> &Self {
            self.delays
                .lock()
                .unwrap()
                .entry(route.to_owned())
                .or_default()
                .push_back(d);
            self
        }

        pub fn calls(&self) -> Vec<Request> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, route: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|r| r.route() == route).count()
        }

        fn next_reply(&self, route: &str) -> Reply {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(route) {
                Some(q) if q.len() > 1 => q.pop_front().unwrap(),
                Some(q) if q.len() == 1 => q.front().cloned().unwrap(),
                _ => Err(FetchError::Transport(format!("no route for {route}"))),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, req: Request) -> Result<Envelope, FetchError> {
            let route = req.route();
            self.calls.lock().unwrap().push(req);
            let delay = self
                .delays
                .lock()
                .unwrap()
                .get_mut(&route)
                .and_then(|q| q.pop_front());
            let reply = self.next_reply(&route);
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            reply
        }
    }
}
