/// dashboard.rs — Live composition of every schedule into one published view
///
/// ─────────────────────────────────────────────────────────────────────────
/// FLOW
/// ─────────────────────────────────────────────────────────────────────────
///
///   signals   ─┐                                  ┌─ positions + stats
///   positions ─┼─ Ticks ─→ event loop (Snapshots) ─┼─ queue snapshot
///   queue     ─┤                                  ├─ log window
///   logs      ─┘                                  └─ per-source status
///                                   │
///                                   └─→ watch::Sender<DashboardView>
///
/// The event loop owns every snapshot cell; nothing else mutates them.
/// Merge runs whenever the signal or position cell takes a new outcome,
/// provided both have settled at least once. A source that has only ever
/// failed contributes an empty list, so signals being down still leaves the
/// exchange-only rows on screen.
///
/// Queue commands are handed to their own task, so a slow round trip never
/// holds up tick handling.
///
/// `stop()` stops every schedule and the loop; no view is published after it
/// returns.
/// ─────────────────────────────────────────────────────────────────────────
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::FetchError;
use crate::log_window::LogWindow;
use crate::merge::merge;
use crate::models::{LogEntry, PositionFeed, QueueSnapshot, Signal, UnifiedPosition};
use crate::queue::QueueView;
use crate::scheduler::{PollHandle, PollTrigger, PollingScheduler, Tick, Ticks};
use crate::source::{
    Applied, LogSource, PositionSource, QueueSource, SignalSource, Snapshot, SourceAdapter,
};
use crate::stats::{aggregate, log_level_counts, AggregateStats, LogLevelCounts};
use crate::transport::{self, CommandAck, Request, Transport};

pub const SIGNAL_CLOSE_PATH: &str = "/api/signals/close";
pub const OKX_CLOSE_PATH:    &str = "/api/okx/close";

// ── Published view ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceStatus {
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SourceStatus {
    fn of<T>(snap: &Snapshot<T>) -> Self {
        Self {
            last_error: snap.last_error().map(str::to_owned),
            updated_at: snap.updated_at(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    /// Bumped on every publish.
    pub revision:           u64,
    /// Both the signal and position sources have reported at least once.
    pub merged:             bool,
    pub positions:          Vec<UnifiedPosition>,
    pub stats:              AggregateStats,
    pub exchange_connected: Option<bool>,
    pub queue:              Option<QueueSnapshot>,
    pub queue_usage:        f64,
    pub logs:               Vec<LogEntry>,
    pub log_counts:         LogLevelCounts,
    pub signals_status:     SourceStatus,
    pub positions_status:   SourceStatus,
    pub queue_status:       SourceStatus,
    pub logs_status:        SourceStatus,
}

// ── Commands ──────────────────────────────────────────────────────────────

/// Close endpoint for a unified row: exchange-only rows close on the
/// exchange by symbol, everything else closes the signal by id.
pub fn close_request(row: &UnifiedPosition) -> Request {
    if row.is_exchange_only() {
        Request::post(format!("{OKX_CLOSE_PATH}/{}", row.symbol))
    } else {
        Request::post(format!("{SIGNAL_CLOSE_PATH}/{}", row.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueCommand {
    Clear,
    Process,
}

type Reply = oneshot::Sender<Result<CommandAck, FetchError>>;

// ── Event loop state ──────────────────────────────────────────────────────

struct Hub {
    signals:   Snapshot<Vec<Signal>>,
    positions: Snapshot<PositionFeed>,
    queue:     QueueView,
    logs:      Snapshot<Vec<LogEntry>>,
    window:    LogWindow,
    view:      DashboardView,
    stopped:   Arc<AtomicBool>,
    tx:        watch::Sender<DashboardView>,
}

impl Hub {
    fn on_signals(&mut self, tick: Tick<Vec<Signal>>, now: DateTime<Utc>) {
        if self.signals.apply(tick, now) == Applied::Stale {
            return;
        }
        self.view.signals_status = SourceStatus::of(&self.signals);
        self.remerge();
        self.publish();
    }

    fn on_positions(&mut self, tick: Tick<PositionFeed>, now: DateTime<Utc>) {
        if self.positions.apply(tick, now) == Applied::Stale {
            return;
        }
        self.view.positions_status = SourceStatus::of(&self.positions);
        self.view.exchange_connected = self.positions.value().and_then(|f| f.connected);
        self.remerge();
        self.publish();
    }

    fn on_queue(&mut self, tick: Tick<QueueSnapshot>, now: DateTime<Utc>) {
        if self.queue.apply(tick, now) == Applied::Stale {
            return;
        }
        self.view.queue_status = SourceStatus::of(self.queue.snapshot());
        self.view.queue = self.queue.current().cloned();
        self.view.queue_usage = self.queue.usage_percent();
        self.publish();
    }

    fn on_logs(&mut self, tick: Tick<Vec<LogEntry>>, now: DateTime<Utc>) {
        match self.logs.apply(tick, now) {
            Applied::Stale => return,
            Applied::Updated => {
                if let Some(batch) = self.logs.value() {
                    let added = self.window.extend(batch);
                    debug!("logs: {added} new line(s), window {}", self.window.len());
                }
                self.view.logs = self.window.to_vec();
                self.view.log_counts = log_level_counts(&self.view.logs);
            }
            Applied::Failed => {}
        }
        self.view.logs_status = SourceStatus::of(&self.logs);
        self.publish();
    }

    /// The round trip runs on its own task; the loop keeps applying ticks.
    fn on_queue_command(&self, cmd: QueueCommand, reply: Reply) {
        let commands = self.queue.commands();
        tokio::spawn(async move {
            let res = match cmd {
                QueueCommand::Clear => commands.clear().await,
                QueueCommand::Process => commands.process().await,
            };
            // Caller may have given up waiting.
            let _ = reply.send(res);
        });
    }

    fn remerge(&mut self) {
        if !(self.signals.settled() && self.positions.settled()) {
            return;
        }
        let signals = self.signals.value().map(Vec::as_slice).unwrap_or(&[]);
        let positions = self.positions.value().map(|f| f.positions.as_slice()).unwrap_or(&[]);
        self.view.positions = merge(signals, positions);
        self.view.stats = aggregate(&self.view.positions);
        self.view.merged = true;
    }

    fn publish(&mut self) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        self.view.revision += 1;
        self.tx.send_replace(self.view.clone());
    }
}

struct Feeds {
    signals:   Ticks<Vec<Signal>>,
    positions: Ticks<PositionFeed>,
    queue:     Ticks<QueueSnapshot>,
    logs:      Ticks<Vec<LogEntry>>,
    commands:  mpsc::UnboundedReceiver<(QueueCommand, Reply)>,
}

async fn run(mut hub: Hub, mut feeds: Feeds) {
    loop {
        tokio::select! {
            Some(t) = feeds.signals.recv() => hub.on_signals(t, Utc::now()),
            Some(t) = feeds.positions.recv() => hub.on_positions(t, Utc::now()),
            Some(t) = feeds.queue.recv() => hub.on_queue(t, Utc::now()),
            Some(t) = feeds.logs.recv() => hub.on_logs(t, Utc::now()),
            Some((cmd, reply)) = feeds.commands.recv() => hub.on_queue_command(cmd, reply),
            else => break,
        }
    }
    debug!("dashboard loop finished");
}

fn schedule<A>(sched: &PollingScheduler, interval: std::time::Duration, adapter: A) -> (PollHandle, Ticks<A::Output>)
where
    A: SourceAdapter + 'static,
{
    let adapter = Arc::new(adapter);
    let name = adapter.name();
    sched.start(name, interval, move || {
        let adapter = adapter.clone();
        async move { adapter.fetch().await }
    })
}

// ── Public entry points ───────────────────────────────────────────────────

pub struct LiveDashboard;

impl LiveDashboard {
    /// Start every schedule and the event loop on the ambient runtime.
    pub fn start(transport: Arc<dyn Transport>, cfg: &AppConfig) -> DashboardHandle {
        let sched = PollingScheduler::new();

        let (signals, signal_ticks) =
            schedule(&sched, cfg.signal_interval(), SignalSource::new(transport.clone()));
        let (positions, position_ticks) =
            schedule(&sched, cfg.position_interval(), PositionSource::new(transport.clone()));
        let (queue, queue_ticks) =
            schedule(&sched, cfg.queue_interval(), QueueSource::new(transport.clone()));
        let (logs, log_ticks) = schedule(
            &sched,
            cfg.log_interval(),
            LogSource::new(transport.clone(), cfg.log_fetch_limit),
        );

        let (view_tx, view) = watch::channel(DashboardView::default());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let stopped = Arc::new(AtomicBool::new(false));

        let hub = Hub {
            signals:   Snapshot::new("signals"),
            positions: Snapshot::new("positions"),
            queue:     QueueView::new(transport.clone(), queue.trigger()),
            logs:      Snapshot::new("logs"),
            window:    LogWindow::new(cfg.log_window),
            view:      DashboardView::default(),
            stopped:   stopped.clone(),
            tx:        view_tx,
        };
        let feeds = Feeds {
            signals:   signal_ticks,
            positions: position_ticks,
            queue:     queue_ticks,
            logs:      log_ticks,
            commands:  command_rx,
        };
        let driver = tokio::spawn(run(hub, feeds));
        info!("dashboard started against {}", cfg.api_url);

        DashboardHandle {
            transport,
            signal_trigger: signals.trigger(),
            position_trigger: positions.trigger(),
            schedules: vec![signals, positions, queue, logs],
            commands: command_tx,
            view,
            stopped,
            driver,
        }
    }
}

pub struct DashboardHandle {
    transport:        Arc<dyn Transport>,
    signal_trigger:   PollTrigger,
    position_trigger: PollTrigger,
    schedules:        Vec<PollHandle>,
    commands:         mpsc::UnboundedSender<(QueueCommand, Reply)>,
    view:             watch::Receiver<DashboardView>,
    stopped:          Arc<AtomicBool>,
    driver:           JoinHandle<()>,
}

impl DashboardHandle {
    /// Latest published view.
    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    /// Re-poll every source now.
    pub fn refresh(&self) {
        for h in &self.schedules {
            h.poll_now();
        }
    }

    /// Close one unified row; on success signals and positions re-poll now.
    pub async fn close_position(&self, row: &UnifiedPosition) -> Result<CommandAck, FetchError> {
        let req = close_request(row);
        let route = req.route();
        let ack = transport::command(self.transport.as_ref(), req).await.map_err(|e| {
            warn!("close {} failed ({route}): {e}", row.symbol);
            e
        })?;
        info!("closed {} via {route}", row.symbol);
        self.signal_trigger.poll_now();
        self.position_trigger.poll_now();
        Ok(ack)
    }

    pub async fn clear_queue(&self) -> Result<CommandAck, FetchError> {
        self.queue_command(QueueCommand::Clear).await
    }

    pub async fn process_queue(&self) -> Result<CommandAck, FetchError> {
        self.queue_command(QueueCommand::Process).await
    }

    async fn queue_command(&self, cmd: QueueCommand) -> Result<CommandAck, FetchError> {
        let gone = || FetchError::Transport("dashboard stopped".into());
        let (tx, rx) = oneshot::channel();
        self.commands.send((cmd, tx)).map_err(|_| gone())?;
        rx.await.map_err(|_| gone())?
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        for h in &self.schedules {
            h.stop();
        }
        self.driver.abort();
        info!("dashboard stopped");
    }
}

impl Drop for DashboardHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
