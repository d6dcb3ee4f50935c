/// main.rs — Monitor entry point
///
/// Subcommands:
///   watch    live positions / stats / queue, redrawn on every update
///   history  one-shot closed-signal table with summary statistics
///   queue    clear or force-process the admission queue
///   close    close one position by symbol
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quant_monitor::config::AppConfig;
use quant_monitor::dashboard::{DashboardView, LiveDashboard};
use quant_monitor::models::PositionTable;
use quant_monitor::sort::{filter_sort, filter_sort_where, HistoryField, PositionField, SortOrder, SortState};
use quant_monitor::source::{HistorySource, SourceAdapter};
use quant_monitor::stats::{history_stats, StatusFilter};
use quant_monitor::transport::{HttpTransport, Transport};

#[derive(Parser)]
#[command(name = "monitor")]
#[command(about = "Live monitor for the quant bot backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream the unified positions view
    Watch {
        /// Case-insensitive symbol filter
        #[arg(short, long, default_value = "")]
        filter: String,

        /// Sort column (symbol, pnl_percent, position_usdt, ...)
        #[arg(short, long, default_value = "pnl_percent")]
        sort: PositionField,

        /// asc | desc
        #[arg(short, long, default_value = "desc")]
        order: SortOrder,

        /// Print the first merged view and exit
        #[arg(long)]
        once: bool,
    },

    /// Closed signals with win rate and pnl summary
    History {
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// all | tp_hit | sl_hit | manual_close
        #[arg(long, default_value = "all")]
        status: StatusFilter,

        #[arg(short, long, default_value = "")]
        filter: String,

        #[arg(short, long, default_value = "closed_at")]
        sort: HistoryField,

        #[arg(short, long, default_value = "desc")]
        order: SortOrder,
    },

    /// Admission queue commands
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Close the position held for a symbol
    Close {
        symbol: String,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    Clear,
    Process,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::from_env()?;
    info!(
        "Config: api={} poll signals={}ms positions={}ms queue={}ms logs={}ms",
        cfg.api_url, cfg.signal_poll_ms, cfg.position_poll_ms, cfg.queue_poll_ms, cfg.log_poll_ms
    );

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&cfg.api_url, cfg.http_timeout())?);

    let command = cli.command.unwrap_or(Commands::Watch {
        filter: String::new(),
        sort:   PositionField::PnlPercent,
        order:  SortOrder::Desc,
        once:   false,
    });

    match command {
        Commands::Watch { filter, sort, order, once } => {
            watch(transport, &cfg, &filter, SortState::new(sort, order), once).await
        }
        Commands::History { limit, status, filter, sort, order } => {
            let source = HistorySource::new(transport, limit, status);
            let history = source.fetch().await.context("history fetch failed")?;
            let rows = filter_sort_where(
                &history,
                &filter,
                |s| status.matches(s.status),
                &SortState::new(sort, order),
            );
            for s in &rows {
                println!(
                    "  {:<14} {:<5} {:<12} {:>+8.2}%  {}",
                    s.symbol,
                    s.direction.as_str(),
                    s.status.as_str(),
                    s.effective_pnl(),
                    s.closed_or_created().format("%Y-%m-%d %H:%M"),
                );
            }
            match history_stats(&rows) {
                Some(stats) => print!("{stats}"),
                None => println!("  no closed trades"),
            }
            Ok(())
        }
        Commands::Queue { action } => {
            let dash = LiveDashboard::start(transport, &cfg);
            let res = match action {
                QueueAction::Clear => dash.clear_queue().await,
                QueueAction::Process => dash.process_queue().await,
            };
            dash.stop();
            let ack = res.context("queue command rejected")?;
            println!("{}", ack.message.as_deref().unwrap_or("ok"));
            Ok(())
        }
        Commands::Close { symbol } => {
            let dash = LiveDashboard::start(transport, &cfg);
            let mut rx = dash.subscribe();
            let view = rx
                .wait_for(|v| v.merged)
                .await
                .context("dashboard stopped before first merge")?
                .clone();
            let Some(row) = view.positions.iter().find(|p| p.symbol.eq_ignore_ascii_case(&symbol)) else {
                dash.stop();
                bail!("no open position for {symbol}");
            };
            let res = dash.close_position(row).await;
            dash.stop();
            res.with_context(|| format!("close {symbol} failed"))?;
            println!("closed {} ({})", row.symbol, row.id);
            Ok(())
        }
    }
}

async fn watch(
    transport: Arc<dyn Transport>,
    cfg:       &AppConfig,
    filter:    &str,
    state:     SortState<PositionField>,
    once:      bool,
) -> Result<()> {
    let dash = LiveDashboard::start(transport, cfg);
    let mut rx = dash.subscribe();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    warn!("dashboard loop ended");
                    break;
                }
                let view = rx.borrow_and_update().clone();
                if !view.merged {
                    continue;
                }
                render(&view, filter, &state);
                if once {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    dash.stop();
    // let the aborted schedules unwind before the runtime goes away
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}

fn render(view: &DashboardView, filter: &str, state: &SortState<PositionField>) {
    let rows = filter_sort(&view.positions, filter, state);
    println!("\n── positions (rev {}) ─────────────────────────────", view.revision);
    print!("{}", PositionTable(&rows));
    print!("{}", view.stats);
    if let Some(q) = &view.queue {
        println!("── queue ({:.0}% full) ─────────────────────────────", view.queue_usage);
        print!("{q}");
    }
    match view.exchange_connected {
        Some(true) => {}
        Some(false) => println!("  OKX: disconnected"),
        None => println!("  OKX: status unknown"),
    }
    for (name, status) in [
        ("signals", &view.signals_status),
        ("positions", &view.positions_status),
        ("queue", &view.queue_status),
        ("logs", &view.logs_status),
    ] {
        if let Some(err) = &status.last_error {
            println!("  {name}: {err}");
        }
    }
    if view.log_counts.error > 0 {
        println!("  backend log: {} error(s) in last {} lines", view.log_counts.error, view.log_counts.total);
    }
}
