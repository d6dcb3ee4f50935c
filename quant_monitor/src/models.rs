/// models.rs — Wire schemas and view records
///
/// Each backend payload is an explicit serde schema; anything that fails to
/// deserialize is rejected at the adapter boundary as a malformed payload.
use serde::{Deserialize, Serialize};

pub mod log;
pub mod position;
pub mod queue;
pub mod signal;
pub mod unified;

pub use log::LogEntry;
pub use position::{ExchangePosition, PositionFeed};
pub use queue::{DynamicInfo, QueueSnapshot, QueuedSignal};
pub use signal::{Signal, SignalStatus};
pub use unified::{PositionTable, UnifiedPosition};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

/// Provenance of a position row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    QuantBot,
    Okx,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::QuantBot => "quant_bot",
            Source::Okx => "okx",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamp parsing shared by the schemas.
///
/// The backend emits RFC 3339 most of the time, but older rows carry naive
/// `YYYY-MM-DDTHH:MM:SS[.ffffff]` or space-separated stamps. Naive stamps are
/// read as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(de: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(de)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("bad timestamp: {raw}")))
    }

    pub fn serialize<S>(dt: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ser.serialize_str(&dt.to_rfc3339())
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        /// Empty strings and nulls are both "absent".
        pub fn deserialize<'de, D>(de: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(de)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("bad timestamp: {raw}"))),
            }
        }

        pub fn serialize<S>(dt: &Option<DateTime<Utc>>, ser: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match dt {
                Some(dt) => ser.serialize_str(&dt.to_rfc3339()),
                None => ser.serialize_none(),
            }
        }
    }
}

/// Numbers that some endpoints send as strings (`"5"` for leverage).
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    pub fn num<'de, D>(de: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumOrStr::deserialize(de)? {
            NumOrStr::Num(n) => Ok(n),
            NumOrStr::Str(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| serde::de::Error::custom(format!("not a number: {s} ({e})"))),
        }
    }

    pub fn opt_num<'de, D>(de: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<NumOrStr>::deserialize(de)? {
            None => Ok(None),
            Some(NumOrStr::Num(n)) => Ok(Some(n)),
            Some(NumOrStr::Str(s)) if s.trim().is_empty() => Ok(None),
            Some(NumOrStr::Str(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("not a number: {s} ({e})"))),
        }
    }
}
