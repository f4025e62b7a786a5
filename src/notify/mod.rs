// src/notify/mod.rs
//! Outbound channel messages.

pub mod format;
pub mod telegram;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::error::SendError;

pub use telegram::TelegramSender;

pub const PARSE_MODE_HTML: &str = "HTML";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Photo { url: String },
    Text,
}

/// One inline URL button under the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub kind: MessageKind,
    /// HTML body; used as the caption for photos.
    pub body: String,
    pub button: Option<LinkButton>,
}

impl OutboundMessage {
    pub fn is_photo(&self) -> bool {
        matches!(self.kind, MessageKind::Photo { .. })
    }

    /// Same body and button, sent as plain text.
    pub fn as_text(&self) -> Self {
        Self {
            kind: MessageKind::Text,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: i64,
}

#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, msg: &OutboundMessage) -> Result<SentMessage, SendError>;
}

pub type DynSender = Arc<dyn ChannelSender>;
