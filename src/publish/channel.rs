// src/publish/channel.rs
//! Sends one topic to its channel and marks it posted with a version-checked write.

use chrono::{DateTime, Utc};
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{SendError, StoreError};
use crate::notify::format::build_message;
use crate::notify::DynSender;
use crate::store::TopicStore;
use crate::topic::Publication;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTarget {
    pub chat_id: String,
    /// Public handle without `@`; enables permalinks.
    pub handle: Option<String>,
}

impl ChannelTarget {
    pub fn permalink(&self, message_id: i64) -> Option<String> {
        self.handle
            .as_deref()
            .map(|h| h.trim().trim_start_matches('@'))
            .filter(|h| !h.is_empty())
            .map(|h| format!("https://t.me/{h}/{message_id}"))
    }
}

#[derive(Debug)]
pub enum PublishOutcome {
    Published(Publication),
    /// Delivered, but the posted flag could not be written. A `Conflict`
    /// means another run marked the topic first.
    Unrecorded {
        publication: Publication,
        error: StoreError,
    },
    /// Another run already marked the topic posted; nothing was sent.
    AlreadyPosted,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not read topic: {0}")]
    Store(#[from] StoreError),

    #[error("send failed: {0}")]
    Send(#[from] SendError),
}

pub struct ChannelPublisher {
    sender: DynSender,
}

impl ChannelPublisher {
    pub fn new(sender: DynSender) -> Self {
        Self { sender }
    }

    pub async fn publish(
        &self,
        topics: &dyn TopicStore,
        topic_id: &str,
        target: &ChannelTarget,
        now: DateTime<Utc>,
    ) -> Result<PublishOutcome, PublishError> {
        let read = topics.fetch_versioned(topic_id).await?;
        let mut topic = read.value;
        if topic.posted {
            info!(target: "cron", topic = %topic_id, "topic already posted; skipping send");
            return Ok(PublishOutcome::AlreadyPosted);
        }

        let msg = build_message(&topic, &target.chat_id);
        let sent = match self.sender.send(&msg).await {
            Ok(s) => s,
            Err(e) if msg.is_photo() && e.is_client_error() => {
                warn!(target: "cron", topic = %topic_id, error = %e, "photo rejected; retrying as text");
                self.sender.send(&msg.as_text()).await?
            }
            Err(e) => return Err(e.into()),
        };

        let publication = Publication {
            channel_id: target.chat_id.clone(),
            message_id: sent.message_id,
            permalink: target.permalink(sent.message_id),
            posted_at: now,
        };
        counter!("topics_published_total", "lang" => topic.language.code()).increment(1);

        topic.mark_posted(publication.clone());
        match topics.replace_if_version(&topic, &read.version).await {
            Ok(()) => {
                info!(
                    target: "cron",
                    lang = %topic.language,
                    topic = %topic_id,
                    message_id = sent.message_id,
                    "topic published"
                );
                Ok(PublishOutcome::Published(publication))
            }
            Err(StoreError::Conflict(path)) => {
                warn!(target: "cron", topic = %topic_id, path = %path, "already published elsewhere; posted flag not written");
                Ok(PublishOutcome::Unrecorded {
                    publication,
                    error: StoreError::Conflict(path),
                })
            }
            Err(error) => {
                warn!(target: "cron", topic = %topic_id, error = %error, "message sent but posted flag write failed");
                Ok(PublishOutcome::Unrecorded { publication, error })
            }
        }
    }
}
