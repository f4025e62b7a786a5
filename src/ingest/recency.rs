// src/ingest/recency.rs
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::model::FeedItem;

/// Trailing window an item must fall into to be considered at all.
pub const RECENCY_WINDOW_HOURS: i64 = 6;

/// Parse the date formats seen in RSS/Atom feeds. `None` when nothing matches.
pub fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%a, %d %b %Y %H:%M:%S %z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    // Zone-less timestamps are read as UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Keep items whose publish time parsed and is not older than `window`.
/// Returns `(kept, dropped)`.
pub fn retain_recent(
    items: Vec<FeedItem>,
    now: DateTime<Utc>,
    window: Duration,
) -> (Vec<FeedItem>, usize) {
    let cutoff = now - window;
    let before = items.len();
    let kept: Vec<FeedItem> = items
        .into_iter()
        .filter(|it| it.published_at.is_some_and(|ts| ts >= cutoff))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
