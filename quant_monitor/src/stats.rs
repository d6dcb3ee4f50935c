/// stats.rs — Aggregate statistics over the dashboard collections
///
/// PORTFOLIO (over unified positions, single pass):
///   notional        = Σ position_usdt
///   unrealized pnl  = Σ unrealized_pnl
///   profitable      = #{ pnl_percent > 0 }
///   losing          = #{ pnl_percent < 0 }
///   per source      = #{ source = quant_bot }, #{ source = okx }
///
///   Missing or non-finite numbers contribute 0, so one bad row never turns
///   a total into NaN.
///
/// HISTORY (over closed signals):
///   pnl_i     = final_pnl when non-zero, else pnl_percent
///   win rate  = #tp_hit / N × 100
///   avg pnl   = Σ pnl_i / N
use serde::Serialize;

use crate::models::{LogEntry, Signal, SignalStatus, Source, UnifiedPosition};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SourceCounts {
    pub quant_bot: usize,
    pub okx:       usize,
}

impl SourceCounts {
    pub fn get(&self, source: Source) -> usize {
        match source {
            Source::QuantBot => self.quant_bot,
            Source::Okx => self.okx,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub positions:            usize,
    pub total_notional:       f64,
    pub total_unrealized_pnl: f64,
    pub profitable:           usize,
    pub losing:               usize,
    pub by_source:            SourceCounts,
}

#[inline]
fn finite(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}

pub fn aggregate(rows: &[UnifiedPosition]) -> AggregateStats {
    let mut stats = AggregateStats::default();
    for r in rows {
        stats.positions += 1;
        stats.total_notional += r.position_usdt.map_or(0.0, finite);
        stats.total_unrealized_pnl += r.unrealized_pnl.map_or(0.0, finite);
        if r.pnl_percent > 0.0 {
            stats.profitable += 1;
        } else if r.pnl_percent < 0.0 {
            stats.losing += 1;
        }
        match r.source {
            Source::QuantBot => stats.by_source.quant_bot += 1,
            Source::Okx => stats.by_source.okx += 1,
        }
    }
    stats
}

impl std::fmt::Display for AggregateStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  Positions      : {} (bot {} / okx {})", self.positions, self.by_source.quant_bot, self.by_source.okx)?;
        writeln!(f, "  Notional       : ${:.2}", self.total_notional)?;
        writeln!(f, "  Unrealized PnL : ${:+.2}", self.total_unrealized_pnl)?;
        writeln!(f, "  Winning/Losing : {} / {}", self.profitable, self.losing)
    }
}

// ── History ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total:        usize,
    pub tp_hit:       usize,
    pub sl_hit:       usize,
    pub manual_close: usize,
    pub expired:      usize,
    pub total_pnl:    f64,
    pub avg_pnl:      f64,
    /// Percent of trades that hit take-profit.
    pub win_rate:     f64,
    pub best_trade:   f64,
    pub worst_trade:  f64,
}

/// `None` for an empty history.
pub fn history_stats(history: &[Signal]) -> Option<HistoryStats> {
    if history.is_empty() {
        return None;
    }
    let mut s = HistoryStats {
        total:        history.len(),
        tp_hit:       0,
        sl_hit:       0,
        manual_close: 0,
        expired:      0,
        total_pnl:    0.0,
        avg_pnl:      0.0,
        win_rate:     0.0,
        best_trade:   f64::NEG_INFINITY,
        worst_trade:  f64::INFINITY,
    };
    for h in history {
        match h.status {
            SignalStatus::TpHit => s.tp_hit += 1,
            SignalStatus::SlHit => s.sl_hit += 1,
            SignalStatus::ManualClose => s.manual_close += 1,
            SignalStatus::Expired => s.expired += 1,
            SignalStatus::Active => {}
        }
        let pnl = h.effective_pnl();
        s.total_pnl += pnl;
        s.best_trade = s.best_trade.max(pnl);
        s.worst_trade = s.worst_trade.min(pnl);
    }
    let n = s.total as f64;
    s.avg_pnl = s.total_pnl / n;
    s.win_rate = s.tp_hit as f64 / n * 100.0;
    Some(s)
}

/// History table status filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    TpHit,
    SlHit,
    ManualClose,
}

impl StatusFilter {
    pub fn matches(&self, status: SignalStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::TpHit => status == SignalStatus::TpHit,
            StatusFilter::SlHit => status == SignalStatus::SlHit,
            StatusFilter::ManualClose => status == SignalStatus::ManualClose,
        }
    }

    /// Value of the history endpoint's `status` query parameter.
    pub fn as_query(&self) -> Option<&'static str> {
        match self {
            StatusFilter::All => None,
            StatusFilter::TpHit => Some(SignalStatus::TpHit.as_str()),
            StatusFilter::SlHit => Some(SignalStatus::SlHit.as_str()),
            StatusFilter::ManualClose => Some(SignalStatus::ManualClose.as_str()),
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "tp_hit" => Ok(StatusFilter::TpHit),
            "sl_hit" => Ok(StatusFilter::SlHit),
            "manual_close" => Ok(StatusFilter::ManualClose),
            other => Err(format!("unknown status filter: {other}")),
        }
    }
}

impl std::fmt::Display for HistoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  Closed trades  : {} (tp {} / sl {} / manual {} / expired {})",
            self.total, self.tp_hit, self.sl_hit, self.manual_close, self.expired)?;
        writeln!(f, "  Win rate       : {:.1}%", self.win_rate)?;
        writeln!(f, "  Total / avg    : {:+.2}% / {:+.2}%", self.total_pnl, self.avg_pnl)?;
        writeln!(f, "  Best / worst   : {:+.2}% / {:+.2}%", self.best_trade, self.worst_trade)
    }
}

// ── Logs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogLevelCounts {
    pub total:   usize,
    pub info:    usize,
    pub success: usize,
    pub signal:  usize,
    pub warning: usize,
    pub error:   usize,
    pub debug:   usize,
}

pub fn log_level_counts(logs: &[LogEntry]) -> LogLevelCounts {
    let mut c = LogLevelCounts::default();
    for l in logs {
        c.total += 1;
        match l.level.as_str() {
            "INFO" => c.info += 1,
            "SUCCESS" => c.success += 1,
            "SIGNAL" => c.signal += 1,
            "WARNING" => c.warning += 1,
            "ERROR" => c.error += 1,
            "DEBUG" => c.debug += 1,
            _ => {}
        }
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;
    use crate::models::{position, signal};

    #[test]
    fn empty_set_is_all_zero() {
        let s = aggregate(&[]);
        assert_eq!(s, AggregateStats::default());
        assert_eq!(s.total_unrealized_pnl, 0.0);
    }

    #[test]
    fn sums_match_rows() {
        let mut a = signal::sample("a", "BTC");
        a.unrealized_pnl = Some(12.5);
        a.position_usdt = Some(500.0);
        a.pnl_percent = 2.5;
        let mut b = signal::sample("b", "XRP");
        b.pnl_percent = -1.0;
        b.unrealized_pnl = None;

        let rows = merge(
            &[a, b],
            &[position::sample("SOL", 20.0, -3.0, -0.5), position::sample("ETH", 10.0, 4.0, 0.0)],
        );
        let s = aggregate(&rows);

        let expected_pnl: f64 = rows.iter().map(|r| r.unrealized_pnl.unwrap_or(0.0)).sum();
        assert_eq!(s.total_unrealized_pnl, expected_pnl);
        assert_eq!(s.total_unrealized_pnl, 13.5);
        assert_eq!(s.total_notional, 500.0 + 100.0 + 100.0);
        assert_eq!(s.positions, 4);
        assert_eq!(s.profitable, 1);
        assert_eq!(s.losing, 2);
        assert_eq!(s.by_source.get(Source::QuantBot), 2);
        assert_eq!(s.by_source.get(Source::Okx), 2);
    }

    #[test]
    fn non_finite_values_count_as_zero() {
        let mut a = signal::sample("a", "BTC");
        a.unrealized_pnl = Some(f64::NAN);
        a.position_usdt = Some(f64::INFINITY);
        a.pnl_percent = f64::NAN;
        let s = aggregate(&merge(&[a], &[]));
        assert_eq!(s.total_unrealized_pnl, 0.0);
        assert_eq!(s.total_notional, 0.0);
        assert_eq!((s.profitable, s.losing), (0, 0));
    }

    #[test]
    fn history_stats_follow_closed_rows() {
        let mut tp = signal::sample("1", "BTC");
        tp.status = SignalStatus::TpHit;
        tp.final_pnl = Some(4.0);
        let mut sl = signal::sample("2", "ETH");
        sl.status = SignalStatus::SlHit;
        sl.pnl_percent = -2.0;
        let mut manual = signal::sample("3", "SOL");
        manual.status = SignalStatus::ManualClose;
        manual.final_pnl = Some(0.0);
        manual.pnl_percent = 1.0;
        let mut exp = signal::sample("4", "ADA");
        exp.status = SignalStatus::Expired;

        let h = history_stats(&[tp, sl, manual, exp]).unwrap();
        assert_eq!((h.tp_hit, h.sl_hit, h.manual_close, h.expired), (1, 1, 1, 1));
        assert_eq!(h.total_pnl, 3.0);
        assert_eq!(h.avg_pnl, 0.75);
        assert_eq!(h.win_rate, 25.0);
        assert_eq!(h.best_trade, 4.0);
        assert_eq!(h.worst_trade, -2.0);

        assert!(history_stats(&[]).is_none());
    }

    #[test]
    fn status_filter() {
        assert!(StatusFilter::All.matches(SignalStatus::Expired));
        assert!(StatusFilter::SlHit.matches(SignalStatus::SlHit));
        assert!(!StatusFilter::SlHit.matches(SignalStatus::TpHit));
        assert_eq!(StatusFilter::All.as_query(), None);
        assert_eq!("manual_close".parse::<StatusFilter>(), Ok(StatusFilter::ManualClose));
        assert!("open".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn counts_log_levels() {
        let log = |level: &str| LogEntry {
            timestamp: "2025-01-01 00:00:00".into(),
            level:     level.into(),
            message:   String::new(),
            module:    None,
        };
        let c = log_level_counts(&[log("INFO"), log("ERROR"), log("INFO"), log("TRACE")]);
        assert_eq!((c.total, c.info, c.error), (4, 2, 1));
    }
}
