// src/pipeline/mod.rs
//! Fetch stage: sources -> recency -> dedup -> relevance -> analysis -> topic.
//!
//! Languages run sequentially and independently; a failure in one never
//! affects another.

pub mod writer;

use chrono::{DateTime, Duration, Utc};
use metrics::gauge;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analyze::{pick_best, select_candidates, DynAnalyst, DynTranslator, TOP_K};
use crate::ingest::collect_items;
use crate::ingest::dedup::{DedupGate, DedupParams};
use crate::ingest::fetcher::FeedFetcher;
use crate::ingest::recency::{retain_recent, RECENCY_WINDOW_HOURS};
use crate::model::{FeedSource, Language};
use crate::outcome::{LanguageOutcome, RunResult};
use crate::relevance::RuleTable;
use crate::store::{DynCooldownStore, DynTopicStore};

#[derive(Debug, Clone, Copy)]
pub struct FetchParams {
    pub recency_window: Duration,
    pub dedup: DedupParams,
    pub top_k: usize,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            recency_window: Duration::hours(RECENCY_WINDOW_HOURS),
            dedup: DedupParams::default(),
            top_k: TOP_K,
        }
    }
}

pub struct FetchStage {
    pub sources: BTreeMap<Language, Vec<FeedSource>>,
    pub fetcher: Arc<dyn FeedFetcher>,
    pub rules: RuleTable,
    pub analyst: DynAnalyst,
    pub translator: DynTranslator,
    pub topics: DynTopicStore,
    pub cooldowns: DynCooldownStore,
    pub params: FetchParams,
}

impl FetchStage {
    pub async fn run(&self, now: DateTime<Utc>) -> RunResult {
        let mut result = RunResult {
            ok: true,
            ..RunResult::default()
        };
        let mut prepared = 0;
        for lang in Language::ALL {
            let outcome = self.run_language(lang, now).await;
            prepared += outcome.prepared.unwrap_or(0);
            result.per_language.insert(lang, outcome);
        }
        result.prepared = Some(prepared);
        gauge!("pipeline_last_run_ts", "stage" => "fetch").set(now.timestamp() as f64);
        info!(target: "fetch", prepared, "fetch run finished");
        result
    }

    pub async fn run_language(&self, lang: Language, now: DateTime<Utc>) -> LanguageOutcome {
        let mut out = LanguageOutcome {
            prepared: Some(0),
            ..LanguageOutcome::default()
        };
        let sources = self.sources.get(&lang).map(Vec::as_slice).unwrap_or_default();
        if sources.is_empty() {
            out.state = Some("no_sources");
            return out;
        }

        let raw = collect_items(self.fetcher.as_ref(), sources).await;
        let fetched = raw.len();
        let (recent, stale) = retain_recent(raw, now, self.params.recency_window);

        // Best effort: an unreadable cooldown document degrades to an empty one.
        let cooldown = match self.cooldowns.load(lang).await {
            Ok(c) => c,
            Err(e) => {
                warn!(target: "fetch", lang = %lang, error = %e, "cooldown read failed; gating without history");
                out.errors.push(format!("cooldown read failed: {e}"));
                Default::default()
            }
        };

        let (admitted, rejected) = DedupGate::new(&cooldown, self.params.dedup).filter(recent, now);
        let scored = self.rules.score_all(admitted);
        info!(
            target: "fetch",
            lang = %lang,
            fetched,
            stale,
            rejected,
            scored = scored.len(),
            "items gated"
        );

        let candidates = select_candidates(
            scored,
            self.params.top_k,
            self.translator.as_ref(),
            self.analyst.as_ref(),
        )
        .await;
        let Some(winner) = pick_best(candidates) else {
            out.state = Some("no_candidate");
            return out;
        };

        match writer::write_winner(
            self.topics.as_ref(),
            self.cooldowns.as_ref(),
            lang,
            &winner,
            cooldown,
            &self.params.dedup,
            now,
        )
        .await
        {
            Ok((topic, warnings)) => {
                out.prepared = Some(1);
                out.topic_id = Some(topic.id);
                out.state = Some("prepared");
                out.errors.extend(warnings);
            }
            Err(e) => {
                warn!(target: "fetch", lang = %lang, error = %e, "topic write failed");
                out.state = Some("write_failed");
                out.errors.push(format!("topic write failed: {e}"));
            }
        }
        out
    }
}
