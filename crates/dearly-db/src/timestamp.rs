//! Timestamps are stored as fixed-width RFC 3339 UTC text with millisecond
//! precision, so `<=` on the column agrees with chronological order.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

pub fn format(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}
