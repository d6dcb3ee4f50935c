/// queue.rs — Admission-queue status view and its two commands
///
/// The queue itself lives in the backend. This side only observes it
/// (`queued → admitted | expired | cleared`) and can ask for two things:
///
///   clear    POST /api/queue/clear     drop every pending signal
///   process  POST /api/queue/process   run one admission pass now
///
/// Both are fire-and-confirm: a confirmed command pokes the queue schedule so
/// the next snapshot arrives immediately; a rejected one leaves the snapshot
/// as it was and hands the error back.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::FetchError;
use crate::models::QueueSnapshot;
use crate::scheduler::{PollTrigger, Tick};
use crate::source::{Applied, Snapshot};
use crate::transport::{self, CommandAck, Request, Transport};

pub const QUEUE_CLEAR_PATH:   &str = "/api/queue/clear";
pub const QUEUE_PROCESS_PATH: &str = "/api/queue/process";

/// The two commands, detached from the snapshot so they can run on their
/// own task.
#[derive(Clone)]
pub struct QueueCommands {
    transport: Arc<dyn Transport>,
    trigger:   PollTrigger,
}

impl QueueCommands {
    pub fn new(transport: Arc<dyn Transport>, trigger: PollTrigger) -> Self {
        Self { transport, trigger }
    }

    pub async fn clear(&self) -> Result<CommandAck, FetchError> {
        self.run(QUEUE_CLEAR_PATH).await
    }

    pub async fn process(&self) -> Result<CommandAck, FetchError> {
        self.run(QUEUE_PROCESS_PATH).await
    }

    async fn run(&self, path: &str) -> Result<CommandAck, FetchError> {
        match transport::command(self.transport.as_ref(), Request::post(path)).await {
            Ok(ack) => {
                info!("queue command {path} ok: {}", ack.message.as_deref().unwrap_or("-"));
                self.trigger.poll_now();
                Ok(ack)
            }
            Err(e) => {
                warn!("queue command {path} failed: {e}");
                Err(e)
            }
        }
    }
}

pub struct QueueView {
    snapshot: Snapshot<QueueSnapshot>,
    commands: QueueCommands,
}

impl QueueView {
    pub fn new(transport: Arc<dyn Transport>, trigger: PollTrigger) -> Self {
        Self { snapshot: Snapshot::new("queue"), commands: QueueCommands::new(transport, trigger) }
    }

    pub fn commands(&self) -> QueueCommands {
        self.commands.clone()
    }

    pub fn apply(&mut self, tick: Tick<QueueSnapshot>, now: DateTime<Utc>) -> Applied {
        self.snapshot.apply(tick, now)
    }

    pub fn snapshot(&self) -> &Snapshot<QueueSnapshot> {
        &self.snapshot
    }

    pub fn current(&self) -> Option<&QueueSnapshot> {
        self.snapshot.value()
    }

    pub async fn clear(&self) -> Result<CommandAck, FetchError> {
        self.commands.clear().await
    }

    pub async fn process(&self) -> Result<CommandAck, FetchError> {
        self.commands.process().await
    }

    /// Fill level in percent; 0 when the backend reports no capacity.
    pub fn usage_percent(&self) -> f64 {
        match self.current() {
            Some(q) if q.max_queue_size > 0 => q.queue_size as f64 / q.max_queue_size as f64 * 100.0,
            _ => 0.0,
        }
    }

    pub fn can_process(&self) -> bool {
        self.current().is_some_and(|q| q.queue_size > 0)
    }

    pub fn can_clear(&self) -> bool {
        self.can_process()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::Instant;

    use crate::scheduler::PollingScheduler;
    use crate::source::{QueueSource, SourceAdapter};
    use crate::transport::testing::FakeTransport;

    fn queue_json(size: u32, max: u32) -> serde_json::Value {
        json!({
            "queue_size": size, "max_queue_size": max,
            "total_queued": 7, "total_executed": 4, "total_expired": 1,
            "top_signals": [{"symbol": "BTC", "confidence": 82.5, "priority": 1.4}]
        })
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_clear_refreshes_immediately() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("GET /api/queue/status", queue_json(3, 10))
            .reply("GET /api/queue/status", queue_json(0, 10))
            .reply("POST /api/queue/clear", json!({"cleared": 3}));

        let source = Arc::new(QueueSource::new(fake.clone()));
        let (handle, mut ticks) = PollingScheduler::new().start("queue", Duration::from_secs(5), move || {
            let source = source.clone();
            async move { source.fetch().await }
        });
        let mut view = QueueView::new(fake.clone(), handle.trigger());

        view.apply(ticks.recv().await.unwrap(), Utc::now());
        assert!(view.can_clear());
        assert_eq!(view.usage_percent(), 30.0);

        let t0 = Instant::now();
        view.clear().await.unwrap();
        view.apply(ticks.recv().await.unwrap(), Utc::now());
        assert!(t0.elapsed() < Duration::from_secs(5));
        assert_eq!(view.current().unwrap().queue_size, 0);
        assert!(!view.can_process());
        assert_eq!(fake.count("POST /api/queue/clear"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_process_keeps_snapshot() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("GET /api/queue/status", queue_json(2, 4))
            .reject("POST /api/queue/process", "auto trade disabled");

        let source = Arc::new(QueueSource::new(fake.clone()));
        let (handle, mut ticks) = PollingScheduler::new().start("queue", Duration::from_secs(5), move || {
            let source = source.clone();
            async move { source.fetch().await }
        });
        let mut view = QueueView::new(fake.clone(), handle.trigger());
        view.apply(ticks.recv().await.unwrap(), Utc::now());

        let err = view.process().await.unwrap_err();
        assert_eq!(err, FetchError::Backend("auto trade disabled".into()));
        assert_eq!(view.current().unwrap().queue_size, 2);

        // no extra poll: the next status read is the regular 5s tick
        let t0 = Instant::now();
        ticks.recv().await.unwrap();
        assert_eq!(t0.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn usage_is_zero_without_capacity() {
        let (handle, _ticks) = PollingScheduler::new().start("queue", Duration::from_secs(60), || async {
            Err::<QueueSnapshot, _>(FetchError::Transport("offline".into()))
        });
        let mut view = QueueView::new(Arc::new(FakeTransport::new()), handle.trigger());
        assert_eq!(view.usage_percent(), 0.0);
        assert!(!view.can_clear());

        let snap: QueueSnapshot = serde_json::from_value(queue_json(0, 0)).unwrap();
        view.apply(Tick { seq: 1, outcome: Ok(snap) }, Utc::now());
        assert_eq!(view.usage_percent(), 0.0);
        assert!(view.snapshot().has_data());
    }
}
