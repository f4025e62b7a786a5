// src/publish/fallback.rs
//! Derives a target-language topic from a topic written for another language.

use chrono::{DateTime, Utc};
use metrics::counter;
use thiserror::Error;
use tracing::info;

use crate::analyze::{TranslationRequest, Translator};
use crate::error::{CollaboratorError, StoreError};
use crate::model::Language;
use crate::store::TopicStore;
use crate::topic::{DeriveError, Topic};

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("translation failed: {0}")]
    Translate(#[from] CollaboratorError),

    #[error(transparent)]
    Derive(#[from] DeriveError),

    #[error("could not persist translated topic: {0}")]
    Store(#[from] StoreError),
}

/// Translate `source` into `target`, persist the derived topic and return it.
pub async fn translate_and_store(
    translator: &dyn Translator,
    topics: &dyn TopicStore,
    source: &Topic,
    target: Language,
    now: DateTime<Utc>,
) -> Result<Topic, FallbackError> {
    if source.translated_from {
        return Err(DeriveError::SourceIsDerived(source.id.clone()).into());
    }
    let req = TranslationRequest {
        from: Some(source.language),
        to: target,
        texts: source.translatable_fields(),
    };
    let translated = translator.translate(&req).await?;
    let derived = source.derive_translated(target, translated, Topic::new_id(), now)?;
    topics.insert(&derived).await?;
    counter!("fallback_translations_total").increment(1);
    info!(
        target: "cron",
        from = %source.language,
        to = %target,
        source_topic = %source.id,
        topic = %derived.id,
        "translated topic stored"
    );
    Ok(derived)
}
