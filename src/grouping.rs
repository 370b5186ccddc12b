//! Partitioning of posts by publication year.

use chrono::{DateTime, Datelike, NaiveDate};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{PostEntry, YearSummary};

/// Posts keyed by publication year, in feed-arrival order within each year
pub type YearBuckets = BTreeMap<i32, Vec<PostEntry>>;

/// Calendar year of an ISO 8601 timestamp
///
/// RFC 3339 timestamps keep the offset they were written with, so
/// `2019-12-31T23:30:00-08:00` belongs to 2019. A bare `YYYY-MM-DD` prefix is
/// accepted as a fallback.
pub fn year_of(timestamp: &str) -> Option<i32> {
    let timestamp = timestamp.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.year());
    }

    timestamp
        .get(..10)
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .map(|date| date.year())
}

/// Group entries by the year of their `published` timestamp
///
/// Every entry lands in exactly one bucket and entries keep their relative order.
///
/// # Errors
/// Returns [`Error::InvalidTimestamp`] for the first entry whose publication
/// timestamp cannot be parsed; no partial grouping is returned.
pub fn group_by_year(entries: Vec<PostEntry>) -> Result<YearBuckets> {
    let mut buckets = YearBuckets::new();

    for entry in entries {
        let Some(year) = year_of(&entry.published) else {
            return Err(Error::InvalidTimestamp {
                value: entry.published,
                title: entry.title,
            });
        };
        buckets.entry(year).or_default().push(entry);
    }

    Ok(buckets)
}

/// Post counts per year, newest year first
pub fn summarize(buckets: &YearBuckets) -> Vec<YearSummary> {
    buckets
        .iter()
        .rev()
        .map(|(year, entries)| YearSummary {
            year: *year,
            count: entries.len(),
        })
        .collect()
}
