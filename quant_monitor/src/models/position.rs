use serde::{Deserialize, Serialize};

use super::{lenient, Direction};

/// A real position held at the exchange, as reported by `/api/okx/positions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangePosition {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Direction>,
    /// Signed contract size; negative is short.
    #[serde(deserialize_with = "lenient::num")]
    pub size: f64,
    #[serde(deserialize_with = "lenient::num")]
    pub entry_price: f64,
    #[serde(deserialize_with = "lenient::num")]
    pub mark_price: f64,
    #[serde(deserialize_with = "lenient::num")]
    pub leverage: f64,
    #[serde(deserialize_with = "lenient::num")]
    pub margin: f64,
    #[serde(default, deserialize_with = "lenient::opt_num", alias = "liquidation_price")]
    pub liq_price: Option<f64>,
    #[serde(rename = "pnl", alias = "unrealized_pnl", deserialize_with = "lenient::num")]
    pub unrealized_pnl: f64,
    #[serde(default, deserialize_with = "lenient::opt_num", skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<f64>,
    #[serde(deserialize_with = "lenient::num")]
    pub pnl_percent: f64,
}

impl ExchangePosition {
    /// Size sign wins; a flat size falls back to the reported side.
    pub fn direction(&self) -> Direction {
        if self.size < 0.0 {
            Direction::Short
        } else if self.size > 0.0 {
            Direction::Long
        } else {
            self.side.unwrap_or(Direction::Long)
        }
    }

    /// Notional exposure: margin × leverage.
    pub fn notional(&self) -> f64 {
        self.margin * self.leverage
    }
}

/// What the position adapter publishes per tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionFeed {
    pub positions: Vec<ExchangePosition>,
    /// `None` when the status call failed this tick.
    pub connected: Option<bool>,
}

#[cfg(test)]
pub(crate) fn sample(symbol: &str, mark_price: f64, pnl: f64, pnl_percent: f64) -> ExchangePosition {
    ExchangePosition {
        symbol: symbol.to_owned(),
        side: Some(Direction::Long),
        size: 1.0,
        entry_price: mark_price,
        mark_price,
        leverage: 5.0,
        margin: 20.0,
        liq_price: None,
        unrealized_pnl: pnl,
        realized_pnl: None,
        pnl_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_string_leverage_and_pnl_alias() {
        let raw = r#"{"symbol":"SOL","side":"short","size":-3,"entry_price":150,
            "mark_price":148.2,"pnl":5.4,"pnl_percent":1.2,"leverage":"10",
            "margin":45,"liq_price":null}"#;
        let p: ExchangePosition = serde_json::from_str(raw).unwrap();
        assert_eq!(p.leverage, 10.0);
        assert_eq!(p.unrealized_pnl, 5.4);
        assert_eq!(p.liq_price, None);
        assert_eq!(p.direction(), Direction::Short);
        assert_eq!(p.notional(), 450.0);
    }

    #[test]
    fn flat_size_uses_side() {
        let mut p = sample("ETH", 10.0, 0.0, 0.0);
        p.size = 0.0;
        p.side = Some(Direction::Short);
        assert_eq!(p.direction(), Direction::Short);
        p.side = None;
        assert_eq!(p.direction(), Direction::Long);
    }

    #[test]
    fn missing_mark_price_is_rejected() {
        let raw = r#"{"symbol":"SOL","size":1,"entry_price":1,"pnl":0,
            "pnl_percent":0,"leverage":1,"margin":1}"#;
        assert!(serde_json::from_str::<ExchangePosition>(raw).is_err());
    }
}
