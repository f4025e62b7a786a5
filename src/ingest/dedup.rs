// src/ingest/dedup.rs
//! Two-tier dedup gate.
//!
//! A busy source is rate-limited through `bySource` (24h) independently of a
//! story that several sources carry, which is caught by `byNormalizedTitle` (48h).
//! Both horizons are half-open: an entry exactly `horizon` old no longer blocks.

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::model::FeedItem;

pub const SOURCE_COOLDOWN_HOURS: i64 = 24;
pub const TITLE_COOLDOWN_HOURS: i64 = 48;
pub const MIN_TITLE_CHARS: usize = 35;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMark {
    /// Epoch milliseconds.
    pub processed_at: i64,
    #[serde(default)]
    pub source_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleMark {
    /// Epoch milliseconds.
    pub processed_at: i64,
}

/// Persisted per-language cooldown document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownEntry {
    #[serde(rename = "processedKeys", default)]
    pub by_source: BTreeMap<String, SourceMark>,
    #[serde(rename = "titleKeys", default)]
    pub by_title: BTreeMap<String, TitleMark>,
}

impl CooldownEntry {
    /// Remember a winning item's source and title at `at`.
    pub fn record(&mut self, source_id: &str, title: &str, at: DateTime<Utc>) {
        let ms = at.timestamp_millis();
        self.by_source.insert(
            source_id.to_string(),
            SourceMark {
                processed_at: ms,
                source_id: source_id.to_string(),
            },
        );
        self.by_title
            .insert(title_hash(title), TitleMark { processed_at: ms });
    }

    /// Drop entries older than `horizon`. Returns how many were removed.
    pub fn evict_older_than(&mut self, now: DateTime<Utc>, horizon: Duration) -> usize {
        let cutoff = (now - horizon).timestamp_millis();
        let before = self.by_source.len() + self.by_title.len();
        self.by_source.retain(|_, m| m.processed_at >= cutoff);
        self.by_title.retain(|_, m| m.processed_at >= cutoff);
        before - (self.by_source.len() + self.by_title.len())
    }

    fn source_at(&self, source_id: &str) -> Option<i64> {
        self.by_source.get(source_id).map(|m| m.processed_at)
    }

    fn title_at(&self, hash: &str) -> Option<i64> {
        self.by_title.get(hash).map(|m| m.processed_at)
    }
}

/// Lower-case, unify quote characters, collapse whitespace.
pub fn normalize_title(s: &str) -> String {
    let unified: String = s
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '`' | '\u{00B4}' => '\'',
            c => c,
        })
        .collect();
    unified.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex SHA-256 prefix of the normalized title; safe as a store key.
pub fn title_hash(title: &str) -> String {
    let digest = Sha256::digest(normalize_title(title).as_bytes());
    digest.iter().take(16).map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TitleTooShort,
    SourceCooldown,
    TitleCooldown,
    /// Same normalized title already admitted earlier in this run.
    TitleSeenThisRun,
}

impl Rejection {
    pub fn label(self) -> &'static str {
        match self {
            Rejection::TitleTooShort => "title_too_short",
            Rejection::SourceCooldown => "source_cooldown",
            Rejection::TitleCooldown => "title_cooldown",
            Rejection::TitleSeenThisRun => "title_seen_this_run",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DedupParams {
    pub source_horizon: Duration,
    pub title_horizon: Duration,
    pub min_title_chars: usize,
}

impl Default for DedupParams {
    fn default() -> Self {
        Self {
            source_horizon: Duration::hours(SOURCE_COOLDOWN_HOURS),
            title_horizon: Duration::hours(TITLE_COOLDOWN_HOURS),
            min_title_chars: MIN_TITLE_CHARS,
        }
    }
}

impl DedupParams {
    /// Larger of the two horizons; entries older than this can be evicted.
    pub fn max_horizon(&self) -> Duration {
        self.source_horizon.max(self.title_horizon)
    }
}

pub struct DedupGate<'a> {
    cooldown: &'a CooldownEntry,
    params: DedupParams,
    seen_titles: HashSet<String>,
}

impl<'a> DedupGate<'a> {
    pub fn new(cooldown: &'a CooldownEntry, params: DedupParams) -> Self {
        Self {
            cooldown,
            params,
            seen_titles: HashSet::new(),
        }
    }

    fn in_cooldown(at_ms: Option<i64>, now: DateTime<Utc>, horizon: Duration) -> bool {
        at_ms.is_some_and(|at| now.timestamp_millis() - at < horizon.num_milliseconds())
    }

    /// Admit or reject one item. Admitted titles are remembered for the rest of the run.
    pub fn check(&mut self, item: &FeedItem, now: DateTime<Utc>) -> Result<(), Rejection> {
        if item.title.trim().chars().count() < self.params.min_title_chars {
            return Err(Rejection::TitleTooShort);
        }
        if Self::in_cooldown(
            self.cooldown.source_at(&item.source_id),
            now,
            self.params.source_horizon,
        ) {
            return Err(Rejection::SourceCooldown);
        }
        let hash = title_hash(&item.title);
        if Self::in_cooldown(self.cooldown.title_at(&hash), now, self.params.title_horizon) {
            return Err(Rejection::TitleCooldown);
        }
        if !self.seen_titles.insert(hash) {
            return Err(Rejection::TitleSeenThisRun);
        }
        Ok(())
    }

    /// Gate a batch, earliest publication first so the first publisher of a
    /// story wins. Returns admitted items and the number rejected.
    pub fn filter(&mut self, mut items: Vec<FeedItem>, now: DateTime<Utc>) -> (Vec<FeedItem>, usize) {
        items.sort_by_key(|it| it.published_at);
        let mut kept = Vec::with_capacity(items.len());
        let mut rejected = 0usize;
        for it in items {
            match self.check(&it, now) {
                Ok(()) => kept.push(it),
                Err(reason) => {
                    rejected += 1;
                    counter!("dedup_rejected_total", "reason" => reason.label()).increment(1);
                    debug!(
                        target: "fetch",
                        source = %it.source_id,
                        reason = reason.label(),
                        "item rejected by dedup gate"
                    );
                }
            }
        }
        (kept, rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;
    use chrono::TimeZone;

    fn item(source: &str, title: &str, at: DateTime<Utc>) -> FeedItem {
        FeedItem {
            source_id: source.into(),
            source_name: source.into(),
            source_language: Language::En,
            title: title.into(),
            link: String::new(),
            guid: String::new(),
            pub_date: String::new(),
            published_at: Some(at),
            description: String::new(),
            image_url: String::new(),
        }
    }

    const LONG: &str = "Parliament passes new digital rights law";

    #[test]
    fn normalization_unifies_case_quotes_and_spaces() {
        assert_eq!(
            normalize_title("  «Big»   News \u{201C}Today\u{201D} "),
            "\"big\" news \"today\""
        );
        assert_eq!(title_hash("Big  NEWS"), title_hash("big news"));
        assert_eq!(title_hash("x").len(), 32);
    }

    #[test]
    fn short_titles_are_rejected() {
        let cd = CooldownEntry::default();
        let mut gate = DedupGate::new(&cd, DedupParams::default());
        let now = Utc::now();
        assert_eq!(
            gate.check(&item("a", "Too short to matter", now), now),
            Err(Rejection::TitleTooShort)
        );
        assert_eq!(gate.check(&item("a", LONG, now), now), Ok(()));
    }

    #[test]
    fn source_horizon_is_half_open() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let mut cd = CooldownEntry::default();
        cd.record("wire", "Some other story entirely, long enough to pass", t0);

        let just_inside = t0 + Duration::hours(24) - Duration::milliseconds(1);
        let mut gate = DedupGate::new(&cd, DedupParams::default());
        assert_eq!(
            gate.check(&item("wire", LONG, just_inside), just_inside),
            Err(Rejection::SourceCooldown)
        );

        let boundary = t0 + Duration::hours(24);
        let mut gate = DedupGate::new(&cd, DedupParams::default());
        assert_eq!(gate.check(&item("wire", LONG, boundary), boundary), Ok(()));
    }

    #[test]
    fn title_horizon_spans_sources() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let mut cd = CooldownEntry::default();
        cd.record("wire", LONG, t0);

        let later = t0 + Duration::hours(30);
        let mut gate = DedupGate::new(&cd, DedupParams::default());
        assert_eq!(
            gate.check(&item("other", LONG, later), later),
            Err(Rejection::TitleCooldown)
        );

        let boundary = t0 + Duration::hours(48);
        let mut gate = DedupGate::new(&cd, DedupParams::default());
        assert_eq!(gate.check(&item("other", LONG, boundary), boundary), Ok(()));
    }

    #[test]
    fn eviction_drops_entries_past_the_larger_horizon() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let mut cd = CooldownEntry::default();
        cd.record("old", "old title", t0);
        cd.record("new", "new title", t0 + Duration::hours(40));
        let removed = cd.evict_older_than(t0 + Duration::hours(49), Duration::hours(48));
        assert_eq!(removed, 2);
        assert!(cd.by_source.contains_key("new"));
        assert!(!cd.by_source.contains_key("old"));
    }

    #[test]
    fn document_shape_matches_store_layout() {
        let mut cd = CooldownEntry::default();
        cd.record("wire", LONG, Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
        let v = serde_json::to_value(&cd).unwrap();
        assert_eq!(v["processedKeys"]["wire"]["processedAt"], 1_700_000_000_000i64);
        assert_eq!(v["processedKeys"]["wire"]["sourceId"], "wire");
        assert_eq!(v["titleKeys"].as_object().unwrap().len(), 1);
    }
}
