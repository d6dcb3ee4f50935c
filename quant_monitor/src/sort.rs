/// sort.rs — Generic sort / filter for every dashboard table
///
/// RULES:
///   filter   case-insensitive substring on the row's text keys, applied first
///   text     collated: case-insensitive order, lowercase before uppercase
///            on a case-only tie
///   number   numeric order; NaN ranks with missing
///   instant  by the underlying UTC instant
///   missing  equal to missing, before any present value (ascending)
///   ties     stable: input order survives in both directions
///   toggle   same field flips the order, a new field starts descending
use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::models::{LogEntry, Signal, UnifiedPosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn flipped(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{other}' (asc|desc)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortValue<'a> {
    Text(&'a str),
    Number(f64),
    Instant(DateTime<Utc>),
    Missing,
}

impl SortValue<'_> {
    /// NaN sorts as absent.
    fn normalized(self) -> Self {
        match self {
            SortValue::Number(x) if x.is_nan() => SortValue::Missing,
            other => other,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Missing => 0,
            SortValue::Number(_) => 1,
            SortValue::Instant(_) => 2,
            SortValue::Text(_) => 3,
        }
    }
}

pub trait Sortable {
    type Field: Copy + PartialEq;

    fn sort_value(&self, field: Self::Field) -> SortValue<'_>;

    /// Text the search box matches against.
    fn filter_text(&self) -> &str;

    fn matches(&self, needle: &str) -> bool {
        matches_filter(self.filter_text(), needle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortState<F> {
    pub field: F,
    pub order: SortOrder,
}

impl<F: Copy + PartialEq> SortState<F> {
    pub fn new(field: F, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Column-header click.
    pub fn toggle(&mut self, field: F) {
        if self.field == field {
            self.order = self.order.flipped();
        } else {
            self.field = field;
            self.order = SortOrder::Desc;
        }
    }
}

pub fn collate(a: &str, b: &str) -> Ordering {
    let fold = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
    fold(a).cmp(&fold(b)).then_with(|| b.cmp(a))
}

pub fn compare(a: &SortValue<'_>, b: &SortValue<'_>) -> Ordering {
    use SortValue::*;
    let (a, b) = (a.normalized(), b.normalized());
    match (a, b) {
        (Text(x), Text(y)) => collate(x, y),
        (Number(x), Number(y)) => x.total_cmp(&y),
        (Instant(x), Instant(y)) => x.cmp(&y),
        _ => a.rank().cmp(&b.rank()),
    }
}

pub fn matches_filter(text: &str, needle: &str) -> bool {
    needle.is_empty() || text.to_lowercase().contains(&needle.to_lowercase())
}

/// Filter then stable-sort into a new collection; `items` is untouched.
pub fn filter_sort<T>(items: &[T], filter: &str, state: &SortState<T::Field>) -> Vec<T>
where
    T: Sortable + Clone,
{
    filter_sort_where(items, filter, |_| true, state)
}

/// `filter_sort` with an extra row predicate (status filters and the like).
pub fn filter_sort_where<T, P>(items: &[T], filter: &str, keep: P, state: &SortState<T::Field>) -> Vec<T>
where
    T: Sortable + Clone,
    P: Fn(&T) -> bool,
{
    let mut out: Vec<T> = items
        .iter()
        .filter(|it| it.matches(filter) && keep(*it))
        .cloned()
        .collect();

    out.sort_by(|a, b| {
        let (ka, kb) = (a.sort_value(state.field), b.sort_value(state.field));
        match state.order {
            SortOrder::Asc => compare(&ka, &kb),
            SortOrder::Desc => compare(&kb, &ka),
        }
    });
    out
}

// ── Positions table ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionField {
    Symbol,
    Direction,
    EntryPrice,
    CurrentPrice,
    PnlPercent,
    PositionUsdt,
    UnrealizedPnl,
    Confidence,
    Source,
    CreatedAt,
}

impl FromStr for PositionField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "symbol"         => PositionField::Symbol,
            "direction"      => PositionField::Direction,
            "entry_price"    => PositionField::EntryPrice,
            "current_price"  => PositionField::CurrentPrice,
            "pnl_percent"    => PositionField::PnlPercent,
            "position_usdt"  => PositionField::PositionUsdt,
            "unrealized_pnl" => PositionField::UnrealizedPnl,
            "confidence"     => PositionField::Confidence,
            "source"         => PositionField::Source,
            "created_at"     => PositionField::CreatedAt,
            other => return Err(format!("unknown position column '{other}'")),
        })
    }
}

impl Sortable for UnifiedPosition {
    type Field = PositionField;

    fn sort_value(&self, field: PositionField) -> SortValue<'_> {
        let opt = |v: Option<f64>| v.map_or(SortValue::Missing, SortValue::Number);
        match field {
            PositionField::Symbol        => SortValue::Text(&self.symbol),
            PositionField::Direction     => SortValue::Text(self.direction.as_str()),
            PositionField::EntryPrice    => SortValue::Number(self.entry_price),
            PositionField::CurrentPrice  => SortValue::Number(self.current_price),
            PositionField::PnlPercent    => SortValue::Number(self.pnl_percent),
            PositionField::PositionUsdt  => opt(self.position_usdt),
            PositionField::UnrealizedPnl => opt(self.unrealized_pnl),
            PositionField::Confidence    => SortValue::Number(self.confidence),
            PositionField::Source        => SortValue::Text(self.source.as_str()),
            PositionField::CreatedAt     => self.created_at.map_or(SortValue::Missing, SortValue::Instant),
        }
    }

    fn filter_text(&self) -> &str {
        &self.symbol
    }
}

// ── History table ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryField {
    Symbol,
    Direction,
    PnlPercent,
    ClosedAt,
    Status,
}

impl FromStr for HistoryField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "symbol"      => HistoryField::Symbol,
            "direction"   => HistoryField::Direction,
            "pnl_percent" => HistoryField::PnlPercent,
            "closed_at"   => HistoryField::ClosedAt,
            "status"      => HistoryField::Status,
            other => return Err(format!("unknown history column '{other}'")),
        })
    }
}

impl Sortable for Signal {
    type Field = HistoryField;

    fn sort_value(&self, field: HistoryField) -> SortValue<'_> {
        match field {
            HistoryField::Symbol     => SortValue::Text(&self.symbol),
            HistoryField::Direction  => SortValue::Text(self.direction.as_str()),
            HistoryField::PnlPercent => SortValue::Number(self.effective_pnl()),
            HistoryField::ClosedAt   => SortValue::Instant(self.closed_or_created()),
            HistoryField::Status     => SortValue::Text(self.status.as_str()),
        }
    }

    fn filter_text(&self) -> &str {
        &self.symbol
    }
}

// ── Logs table ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogField {
    Timestamp,
    Level,
}

impl Sortable for LogEntry {
    type Field = LogField;

    fn sort_value(&self, field: LogField) -> SortValue<'_> {
        match field {
            LogField::Timestamp => self.instant().map_or(SortValue::Missing, SortValue::Instant),
            LogField::Level => SortValue::Text(&self.level),
        }
    }

    fn filter_text(&self) -> &str {
        &self.message
    }

    fn matches(&self, needle: &str) -> bool {
        matches_filter(&self.message, needle) || matches_filter(&self.timestamp, needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;
    use crate::models::{signal, ExchangePosition, SignalStatus};
    use chrono::{Duration, TimeZone};

    #[derive(Debug, Clone, PartialEq)]
    struct Row(&'static str, f64);

    impl Sortable for Row {
        type Field = ();
        fn sort_value(&self, _: ()) -> SortValue<'_> {
            SortValue::Number(self.1)
        }
        fn filter_text(&self) -> &str {
            self.0
        }
    }

    fn names(rows: &[Row]) -> Vec<&'static str> {
        rows.iter().map(|r| r.0).collect()
    }

    #[test]
    fn scenario_d_descending_keeps_tie_order() {
        let rows = vec![Row("A", 2.0), Row("B", 5.0), Row("C", 5.0)];
        let out = filter_sort(&rows, "", &SortState::new((), SortOrder::Desc));
        assert_eq!(names(&out), vec!["B", "C", "A"]);
        // input untouched
        assert_eq!(names(&rows), vec!["A", "B", "C"]);
    }

    #[test]
    fn ascending_is_stable_too() {
        let rows = vec![Row("x", 1.0), Row("y", 0.0), Row("z", 1.0), Row("w", 0.0)];
        let out = filter_sort(&rows, "", &SortState::new((), SortOrder::Asc));
        assert_eq!(names(&out), vec!["y", "w", "x", "z"]);
    }

    #[test]
    fn nan_ranks_with_missing() {
        let rows = vec![Row("b", 1.0), Row("a", f64::NAN), Row("c", -2.0)];
        let out = filter_sort(&rows, "", &SortState::new((), SortOrder::Asc));
        assert_eq!(names(&out), vec!["a", "c", "b"]);
        let out = filter_sort(&rows, "", &SortState::new((), SortOrder::Desc));
        assert_eq!(names(&out), vec!["b", "c", "a"]);
    }

    #[test]
    fn nan_pnl_from_the_wire_sorts_without_panicking() {
        let raw: Vec<serde_json::Value> = (0..40)
            .map(|i| {
                let pnl = if i % 3 == 0 { serde_json::json!("NaN") } else { serde_json::json!((i * 7 % 23) as f64 - 11.0) };
                serde_json::json!({
                    "symbol": format!("C{i:02}USDT"),
                    "size": "1", "entry_price": "10", "mark_price": "10",
                    "leverage": "5", "margin": "20", "pnl": "0",
                    "pnl_percent": pnl,
                })
            })
            .collect();
        let positions: Vec<ExchangePosition> = serde_json::from_value(serde_json::Value::Array(raw)).unwrap();
        let rows = merge(&[], &positions);
        assert_eq!(rows.len(), 40);

        let out = filter_sort(&rows, "", &SortState::new(PositionField::PnlPercent, SortOrder::Desc));
        assert_eq!(out.len(), 40);
        let nan_count = (0..40).filter(|i| i % 3 == 0).count();
        let (finite, nan) = out.split_at(40 - nan_count);
        assert!(nan.iter().all(|r| r.pnl_percent.is_nan()));
        assert!(finite.iter().all(|r| r.pnl_percent.is_finite()));
        assert!(finite.windows(2).all(|w| w[0].pnl_percent >= w[1].pnl_percent));
    }

    #[test]
    fn log_filter_matches_timestamp_or_message() {
        let log = |ts: &str, msg: &str| LogEntry {
            timestamp: ts.into(),
            level: "INFO".into(),
            message: msg.into(),
            module: None,
        };
        let rows = vec![
            log("2025-01-01 10:00:01", "order placed"),
            log("2025-01-01 10:00:02", "heartbeat"),
        ];
        let state = SortState::new(LogField::Timestamp, SortOrder::Asc);
        let out = filter_sort(&rows, "10:00:01", &state);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].message, "order placed");
        assert_eq!(filter_sort(&rows, "HEARTBEAT", &state).len(), 1);
        assert!(filter_sort(&rows, "11:00", &state).is_empty());
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let rows = vec![Row("BTC", 1.0), Row("ETH", 2.0), Row("wbtc", 3.0)];
        let out = filter_sort(&rows, "bt", &SortState::new((), SortOrder::Asc));
        assert_eq!(names(&out), vec!["BTC", "wbtc"]);
    }

    #[test]
    fn text_collation_ignores_case_first() {
        assert_eq!(collate("apple", "Banana"), Ordering::Less);
        assert_eq!(collate("Zed", "alpha"), Ordering::Greater);
        assert_eq!(collate("eth", "ETH"), Ordering::Less);
        assert_eq!(collate("SOL", "SOL"), Ordering::Equal);
    }

    #[test]
    fn toggle_flips_same_field_and_resets_new_one() {
        let mut st = SortState::new(PositionField::PnlPercent, SortOrder::Desc);
        st.toggle(PositionField::PnlPercent);
        assert_eq!(st.order, SortOrder::Asc);
        st.toggle(PositionField::Symbol);
        assert_eq!(st, SortState::new(PositionField::Symbol, SortOrder::Desc));
        st.toggle(PositionField::Symbol);
        assert_eq!(st.order, SortOrder::Asc);
    }

    #[test]
    fn timestamps_sort_by_instant_not_text() {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let mut early = signal::sample("early", "AAA");
        early.created_at = base;
        let mut late = signal::sample("late", "BBB");
        late.created_at = base + Duration::hours(2);
        let mut closed = signal::sample("closed", "CCC");
        closed.created_at = base - Duration::days(1);
        closed.closed_at = Some(base + Duration::hours(1));
        closed.status = SignalStatus::TpHit;

        let out = filter_sort(&[late, early, closed], "", &SortState::new(HistoryField::ClosedAt, SortOrder::Asc));
        let ids: Vec<&str> = out.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "closed", "late"]);
    }

    #[test]
    fn log_timestamps_parse_before_compare() {
        let log = |ts: &str, msg: &str| LogEntry {
            timestamp: ts.into(),
            level: "INFO".into(),
            message: msg.into(),
            module: None,
        };
        let rows = vec![
            log("2025-01-02 00:00:00", "b"),
            log("2025-01-01T23:00:00+00:00", "a"),
            log("garbage", "z"),
        ];
        let out = filter_sort(&rows, "", &SortState::new(LogField::Timestamp, SortOrder::Desc));
        let msgs: Vec<&str> = out.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(msgs, vec!["b", "a", "z"]);
    }

    #[test]
    fn positions_missing_notional_sorts_last_descending() {
        let mut a = signal::sample("a", "AAA");
        a.position_usdt = Some(10.0);
        let b = signal::sample("b", "BBB");
        let mut c = signal::sample("c", "CCC");
        c.position_usdt = Some(50.0);
        let rows = merge(&[a, b, c], &[]);
        let out = filter_sort(&rows, "", &SortState::new(PositionField::PositionUsdt, SortOrder::Desc));
        let syms: Vec<&str> = out.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(syms, vec!["CCC", "AAA", "BBB"]);
    }

    #[test]
    fn history_status_predicate_applies_before_sort() {
        let mut tp = signal::sample("1", "BTC");
        tp.status = SignalStatus::TpHit;
        let mut sl = signal::sample("2", "BTCDOM");
        sl.status = SignalStatus::SlHit;
        let out = filter_sort_where(
            &[tp, sl],
            "btc",
            |s| s.status == SignalStatus::SlHit,
            &SortState::new(HistoryField::Symbol, SortOrder::Asc),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "2");
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!("pnl_percent".parse::<PositionField>(), Ok(PositionField::PnlPercent));
        assert_eq!("ASC".parse::<SortOrder>(), Ok(SortOrder::Asc));
        assert!("pnl".parse::<PositionField>().is_err());
        assert_eq!("closed_at".parse::<HistoryField>(), Ok(HistoryField::ClosedAt));
    }
}
