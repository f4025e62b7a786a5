// src/pipeline/writer.rs
//! Turns the winning candidate into a durable topic and updates the cooldown.

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{info, warn};

use crate::analyze::RankedCandidate;
use crate::error::StoreError;
use crate::ingest::anon_hash;
use crate::ingest::dedup::{CooldownEntry, DedupParams};
use crate::model::Language;
use crate::store::{CooldownStore, TopicStore};
use crate::topic::{next_hour_boundary, Topic, SECTION_NEWS};

/// Build the persisted record for `winner`, scheduled for the next full hour.
pub fn build_topic(winner: &RankedCandidate, language: Language, id: String, now: DateTime<Utc>) -> Topic {
    let item = &winner.candidate.item;
    let c = &winner.candidate.commentary;
    Topic {
        id,
        title: item.title.clone(),
        sense: c.sense.clone(),
        why: c.why.clone(),
        view: c.view.clone(),
        question: c.question.clone(),
        text: None,
        section: SECTION_NEWS.to_string(),
        language,
        created_at: now,
        scheduled_for: next_hour_boundary(now),
        source_link: item.link.clone(),
        source_name: item.source_name.clone(),
        source_published_at: item.published_at,
        image: item.image_url.clone(),
        relevance_score: winner.candidate.relevance,
        quality_score: winner.quality,
        posted: false,
        publication: None,
        translated_from: false,
        source_language: None,
        source_topic_id: None,
    }
}

/// Persist the topic first, then record the winner in the cooldown document.
///
/// A cooldown write failure is reported in the returned warnings; the topic
/// stays written.
pub async fn write_winner(
    topics: &dyn TopicStore,
    cooldowns: &dyn CooldownStore,
    language: Language,
    winner: &RankedCandidate,
    mut cooldown: CooldownEntry,
    params: &DedupParams,
    now: DateTime<Utc>,
) -> Result<(Topic, Vec<String>), StoreError> {
    let topic = build_topic(winner, language, Topic::new_id(), now);
    topics.insert(&topic).await?;
    counter!("topics_prepared_total").increment(1);
    info!(
        target: "fetch",
        lang = %language,
        topic = %topic.id,
        title = %anon_hash(&topic.title),
        relevance = topic.relevance_score,
        quality = topic.quality_score,
        scheduled_for = %topic.scheduled_for,
        "topic prepared"
    );

    let item = &winner.candidate.item;
    cooldown.record(&item.source_id, &item.title, now);
    let evicted = cooldown.evict_older_than(now, params.max_horizon());

    let mut warnings = Vec::new();
    if let Err(e) = cooldowns.save(language, &cooldown).await {
        warn!(target: "fetch", lang = %language, error = %e, "cooldown write failed");
        warnings.push(format!("cooldown write failed: {e}"));
    } else if evicted > 0 {
        info!(target: "fetch", lang = %language, evicted, "evicted stale cooldown entries");
    }
    Ok((topic, warnings))
}
