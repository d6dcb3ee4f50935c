use serde::{Deserialize, Serialize};

/// Admission-control state owned by the backend; rendered verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSnapshot {
    pub queue_size:     u32,
    pub max_queue_size: u32,
    pub total_queued:   u64,
    pub total_executed: u64,
    pub total_expired:  u64,
    /// Pending signals, ranked by the backend (confidence descending).
    #[serde(default)]
    pub top_signals:    Vec<QueuedSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_info:   Option<DynamicInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedSignal {
    pub symbol:     String,
    pub confidence: f64,
    pub priority:   f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicInfo {
    pub total_balance:      f64,
    /// Position count the backend considers optimal for the balance.
    pub optimal_positions:  u32,
    pub current_positions:  u32,
    pub available_slots:    u32,
    pub position_size_usdt: f64,
    pub auto_trade_enabled: bool,
}

impl std::fmt::Display for QueueSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  Queue          : {} / {}", self.queue_size, self.max_queue_size)?;
        writeln!(
            f,
            "  Lifetime       : queued {}  executed {}  expired {}",
            self.total_queued, self.total_executed, self.total_expired
        )?;
        if let Some(info) = &self.dynamic_info {
            writeln!(f, "  Balance        : ${:.2}", info.total_balance)?;
            writeln!(
                f,
                "  Slots          : {} open / {} optimal ({} free, ${:.2} each)",
                info.current_positions, info.optimal_positions,
                info.available_slots, info.position_size_usdt
            )?;
            writeln!(f, "  Auto-trade     : {}", if info.auto_trade_enabled { "ON" } else { "OFF" })?;
        }
        for (rank, s) in self.top_signals.iter().enumerate() {
            writeln!(f, "  #{:<2} {:<12} conf {:>5.1}  prio {:.2}", rank + 1, s.symbol, s.confidence, s.priority)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_without_dynamic_info() {
        let raw = r#"{"queue_size":2,"max_queue_size":10,"total_queued":40,
            "total_executed":31,"total_expired":7,
            "top_signals":[{"symbol":"ETH","confidence":88,"priority":0.88},
                           {"symbol":"XRP","confidence":74,"priority":0.74}]}"#;
        let q: QueueSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(q.top_signals.len(), 2);
        assert_eq!(q.top_signals[0].symbol, "ETH");
        assert!(q.dynamic_info.is_none());
        assert!(q.to_string().contains("2 / 10"));
    }
}
