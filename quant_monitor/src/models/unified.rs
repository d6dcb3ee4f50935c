use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{timestamp, Direction, Source};

/// The merged row shown in the positions table; one per symbol.
///
/// Built only through [`crate::merge::unify`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnifiedPosition {
    pub id:            String,
    pub symbol:        String,
    pub direction:     Direction,
    pub entry_price:   f64,
    pub current_price: f64,
    pub pnl_percent:   f64,
    pub position_usdt:  Option<f64>,
    pub unrealized_pnl: Option<f64>,
    pub stop_loss:     f64,
    pub take_profit:   f64,
    pub confidence:    f64,
    pub source:        Source,
    pub market_phase:  String,
    #[serde(with = "timestamp::option")]
    pub created_at:    Option<DateTime<Utc>>,
    pub leverage:      Option<f64>,
    pub liq_price:     Option<f64>,
}

impl UnifiedPosition {
    /// Rows synthesised from an exchange position with no backing signal.
    pub fn is_exchange_only(&self) -> bool {
        self.created_at.is_none() && self.id == format!("{}{}", crate::merge::EXCHANGE_ID_PREFIX, self.symbol)
    }
}

/// Fixed-width text rendering of the positions table.
pub struct PositionTable<'a>(pub &'a [UnifiedPosition]);

impl std::fmt::Display for PositionTable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "  {:<14} {:<5} {:>12} {:>12} {:>8} {:>10} {:>10} {:>5}  {:<8}",
            "SYMBOL", "DIR", "ENTRY", "PRICE", "PNL%", "NOTIONAL", "UPNL", "CONF", "SOURCE"
        )?;
        let dash = "-";
        for p in self.0 {
            let notional = p.position_usdt.map(|v| format!("{v:.2}"));
            let upnl = p.unrealized_pnl.map(|v| format!("{v:+.2}"));
            writeln!(
                f,
                "  {:<14} {:<5} {:>12.4} {:>12.4} {:>+8.2} {:>10} {:>10} {:>5.0}  {:<8}",
                p.symbol,
                p.direction.as_str(),
                p.entry_price,
                p.current_price,
                p.pnl_percent,
                notional.as_deref().unwrap_or(dash),
                upnl.as_deref().unwrap_or(dash),
                p.confidence,
                p.source.as_str(),
            )?;
        }
        Ok(())
    }
}
