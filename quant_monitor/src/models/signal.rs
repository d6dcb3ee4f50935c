use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{timestamp, Direction, Source};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Active,
    TpHit,
    SlHit,
    ManualClose,
    Expired,
}

impl SignalStatus {
    /// Terminal signals are immutable history.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SignalStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Active      => "active",
            SignalStatus::TpHit       => "tp_hit",
            SignalStatus::SlHit       => "sl_hit",
            SignalStatus::ManualClose => "manual_close",
            SignalStatus::Expired     => "expired",
        }
    }
}

/// A virtual position tracked by the strategy engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub id:            String,
    pub symbol:        String,
    pub direction:     Direction,
    pub entry_price:   f64,
    pub current_price: f64,
    pub stop_loss:     f64,
    pub take_profit:   f64,
    /// 0–100
    pub confidence:    f64,
    pub pnl_percent:   f64,
    pub status:        SignalStatus,
    #[serde(default)]
    pub market_phase:  String,
    #[serde(default)]
    pub entry_reason:  String,

    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub closed_at:  Option<DateTime<Utc>>,

    // ── Position sizing / pnl (quote currency) ───────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_size:  Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_usdt:  Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unrealized_pnl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_pnl:   Option<f64>,
    /// Final pnl percent, set once the signal is closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_pnl:      Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

impl Signal {
    /// Pnl percent used by history views: `final_pnl` once it carries a
    /// non-zero value, otherwise the running `pnl_percent`.
    pub fn effective_pnl(&self) -> f64 {
        match self.final_pnl {
            Some(p) if p != 0.0 && p.is_finite() => p,
            _ if self.pnl_percent.is_finite() => self.pnl_percent,
            _ => 0.0,
        }
    }

    /// Close time, or creation time for rows that never closed.
    pub fn closed_or_created(&self) -> DateTime<Utc> {
        self.closed_at.unwrap_or(self.created_at)
    }
}

#[cfg(test)]
pub(crate) fn sample(id: &str, symbol: &str) -> Signal {
    use chrono::TimeZone;
    Signal {
        id:            id.to_owned(),
        symbol:        symbol.to_owned(),
        direction:     Direction::Long,
        entry_price:   100.0,
        current_price: 100.0,
        stop_loss:     95.0,
        take_profit:   110.0,
        confidence:    75.0,
        pnl_percent:   0.0,
        status:        SignalStatus::Active,
        market_phase:  "ACCUMULATION".into(),
        entry_reason:  String::new(),
        created_at:    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        updated_at:    None,
        closed_at:     None,
        position_size:  None,
        position_usdt:  None,
        unrealized_pnl: None,
        realized_pnl:   None,
        final_pnl:      None,
        source:         None,
    }
}
