/// merge.rs — Signal / exchange reconciliation
///
/// ─────────────────────────────────────────────────────────────────────────
/// OVERRIDE RULE (one place: `unify`)
/// ─────────────────────────────────────────────────────────────────────────
///
///   signal + exchange  → exchange owns live pricing:
///                          current_price  = mark_price
///                          pnl_percent, unrealized_pnl
///                          position_usdt  = margin × leverage
///                          leverage, liq_price
///                          source         = okx
///                        signal owns id, direction, entry, SL/TP,
///                        confidence, market phase, created_at
///
///   signal only        → signal as-is, source = signal.source ?? quant_bot
///
///   exchange only      → id = "okx_<symbol>", confidence = 100,
///                        market_phase = "OKX", SL = TP = 0, source = okx
///
/// Output order: signals in input order, then exchange-only positions in
/// input order. One row per symbol; a repeated symbol inside either input
/// keeps its first occurrence. No clock reads, no randomness.
/// ─────────────────────────────────────────────────────────────────────────
use ahash::{AHashMap, AHashSet};
use tracing::debug;

use crate::models::{ExchangePosition, Signal, Source, UnifiedPosition};

pub const EXCHANGE_ID_PREFIX: &str = "okx_";
pub const EXCHANGE_ONLY_CONFIDENCE: f64 = 100.0;
pub const EXCHANGE_ONLY_PHASE: &str = "OKX";

/// Build one unified row from whichever sides are present.
pub fn unify(signal: Option<&Signal>, exchange: Option<&ExchangePosition>) -> Option<UnifiedPosition> {
    match (signal, exchange) {
        (Some(s), Some(x)) => Some(UnifiedPosition {
            id:             s.id.clone(),
            symbol:         s.symbol.clone(),
            direction:      s.direction,
            entry_price:    s.entry_price,
            current_price:  x.mark_price,
            pnl_percent:    x.pnl_percent,
            position_usdt:  Some(x.notional()),
            unrealized_pnl: Some(x.unrealized_pnl),
            stop_loss:      s.stop_loss,
            take_profit:    s.take_profit,
            confidence:     s.confidence,
            source:         Source::Okx,
            market_phase:   s.market_phase.clone(),
            created_at:     Some(s.created_at),
            leverage:       Some(x.leverage),
            liq_price:      x.liq_price,
        }),
        (Some(s), None) => Some(UnifiedPosition {
            id:             s.id.clone(),
            symbol:         s.symbol.clone(),
            direction:      s.direction,
            entry_price:    s.entry_price,
            current_price:  s.current_price,
            pnl_percent:    s.pnl_percent,
            position_usdt:  s.position_usdt,
            unrealized_pnl: s.unrealized_pnl,
            stop_loss:      s.stop_loss,
            take_profit:    s.take_profit,
            confidence:     s.confidence,
            source:         s.source.unwrap_or(Source::QuantBot),
            market_phase:   s.market_phase.clone(),
            created_at:     Some(s.created_at),
            leverage:       None,
            liq_price:      None,
        }),
        (None, Some(x)) => Some(UnifiedPosition {
            id:             format!("{EXCHANGE_ID_PREFIX}{}", x.symbol),
            symbol:         x.symbol.clone(),
            direction:      x.direction(),
            entry_price:    x.entry_price,
            current_price:  x.mark_price,
            pnl_percent:    x.pnl_percent,
            position_usdt:  Some(x.notional()),
            unrealized_pnl: Some(x.unrealized_pnl),
            stop_loss:      0.0,
            take_profit:    0.0,
            confidence:     EXCHANGE_ONLY_CONFIDENCE,
            source:         Source::Okx,
            market_phase:   EXCHANGE_ONLY_PHASE.to_owned(),
            created_at:     None,
            leverage:       Some(x.leverage),
            liq_price:      x.liq_price,
        }),
        (None, None) => None,
    }
}

/// Merge the latest signal and exchange snapshots into one row per symbol.
pub fn merge(signals: &[Signal], positions: &[ExchangePosition]) -> Vec<UnifiedPosition> {
    let mut by_symbol: AHashMap<&str, &ExchangePosition> = AHashMap::with_capacity(positions.len());
    for p in positions {
        if by_symbol.contains_key(p.symbol.as_str()) {
            debug!("merge: duplicate exchange position for {}, keeping first", p.symbol);
            continue;
        }
        by_symbol.insert(p.symbol.as_str(), p);
    }

    let mut seen: AHashSet<&str> = AHashSet::with_capacity(signals.len() + positions.len());
    let mut out = Vec::with_capacity(signals.len() + positions.len());

    for s in signals {
        if !seen.insert(s.symbol.as_str()) {
            debug!("merge: duplicate signal {} for {}, keeping first", s.id, s.symbol);
            continue;
        }
        let exchange = by_symbol.get(s.symbol.as_str()).copied();
        out.extend(unify(Some(s), exchange));
    }

    for p in positions {
        if seen.insert(p.symbol.as_str()) {
            out.extend(unify(None, Some(p)));
        }
    }

    out
}
