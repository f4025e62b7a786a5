// src/analyze/selector.rs
//! Candidate selection: top-K by relevance, translated into the analysis
//! language when needed, then analyzed. Failures drop a single candidate.

use metrics::counter;
use tracing::{debug, warn};

use crate::analyze::ai_adapter::{AnalysisRequest, Analyst, TranslationRequest, Translator};
use crate::ingest::anon_hash;
use crate::model::{FeedItem, Language};
use crate::relevance::ScoredItem;
use crate::topic::Commentary;

pub const TOP_K: usize = 5;

/// A candidate that survived analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedCandidate {
    pub item: FeedItem,
    pub relevance: i32,
    pub commentary: Commentary,
}

/// Highest scores first; equal scores keep their input order.
pub fn top_k(mut scored: Vec<ScoredItem>, k: usize) -> Vec<ScoredItem> {
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(k);
    scored
}

/// Title and description in the analysis language. Falls back to the
/// original text when translation fails.
async fn analysis_text(translator: &dyn Translator, item: &FeedItem) -> (String, String) {
    if item.source_language == Language::ANALYSIS {
        return (item.title.clone(), item.description.clone());
    }
    let req = TranslationRequest {
        from: Some(item.source_language),
        to: Language::ANALYSIS,
        texts: vec![item.title.clone(), item.description.clone()],
    };
    match translator.translate(&req).await {
        Ok(mut out) if out.len() == 2 => {
            let description = out.pop().unwrap_or_default();
            let title = out.pop().unwrap_or_default();
            (title, description)
        }
        Ok(out) => {
            warn!(
                target: "fetch",
                title = %anon_hash(&item.title),
                got = out.len(),
                "translation returned wrong field count; analyzing original text"
            );
            (item.title.clone(), item.description.clone())
        }
        Err(e) => {
            warn!(
                target: "fetch",
                title = %anon_hash(&item.title),
                error = %e,
                "translation failed; analyzing original text"
            );
            (item.title.clone(), item.description.clone())
        }
    }
}

/// Analyze the top `k` items in ranked order. The returned list keeps that order.
pub async fn select_candidates(
    scored: Vec<ScoredItem>,
    k: usize,
    translator: &dyn Translator,
    analyst: &dyn Analyst,
) -> Vec<AnalyzedCandidate> {
    let mut out = Vec::new();
    for ScoredItem { item, score } in top_k(scored, k) {
        let (title, description) = analysis_text(translator, &item).await;
        let req = AnalysisRequest {
            title,
            description,
            source_name: item.source_name.clone(),
            link: item.link.clone(),
            output_language: item.source_language,
        };
        counter!("candidates_analyzed_total").increment(1);
        match analyst.analyze(&req).await {
            Ok(commentary) if commentary.is_complete() => {
                debug!(target: "fetch", title = %anon_hash(&item.title), relevance = score, "candidate analyzed");
                out.push(AnalyzedCandidate {
                    item,
                    relevance: score,
                    commentary,
                });
            }
            Ok(commentary) => {
                warn!(
                    target: "fetch",
                    title = %anon_hash(&item.title),
                    missing = commentary.first_missing().unwrap_or("?"),
                    "analysis incomplete; candidate dropped"
                );
            }
            Err(e) => {
                warn!(
                    target: "fetch",
                    provider = analyst.provider_name(),
                    title = %anon_hash(&item.title),
                    error = %e,
                    "analysis failed; candidate dropped"
                );
            }
        }
    }
    out
}
