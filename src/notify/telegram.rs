// src/notify/telegram.rs
//! Telegram Bot API sender (`sendPhoto` / `sendMessage`). No retries here;
//! the publisher decides on fallbacks.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SendError;
use crate::notify::{ChannelSender, LinkButton, MessageKind, OutboundMessage, SentMessage, PARSE_MODE_HTML};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramSender {
    client: Client,
    api_base: String,
    token: String,
}

#[derive(Serialize)]
struct InlineKeyboard<'a> {
    inline_keyboard: [[&'a LinkButton; 1]; 1],
}

#[derive(Serialize)]
struct PhotoReq<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Serialize)]
struct TextReq<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<ApiMessage>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    message_id: i64,
}

impl TelegramSender {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>, timeout: Duration) -> Result<Self, SendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }
}

/// Map an API reply to a typed result; the Bot API reports errors in the body.
fn classify(status: u16, body: &str) -> Result<SentMessage, SendError> {
    match serde_json::from_str::<ApiResponse>(body) {
        Ok(ApiResponse {
            ok: true,
            result: Some(m),
            ..
        }) => Ok(SentMessage {
            message_id: m.message_id,
        }),
        Ok(ApiResponse { ok: true, .. }) => {
            Err(SendError::Malformed("ok response without message_id".into()))
        }
        Ok(r) => {
            let code = r.error_code.unwrap_or(status);
            let description = r.description.unwrap_or_default();
            if (400..500).contains(&code) {
                Err(SendError::Client { code, description })
            } else {
                Err(SendError::Server { code, description })
            }
        }
        Err(_) if (400..500).contains(&status) => Err(SendError::Client {
            code: status,
            description: body.chars().take(200).collect(),
        }),
        Err(_) if status >= 500 => Err(SendError::Server {
            code: status,
            description: body.chars().take(200).collect(),
        }),
        Err(e) => Err(SendError::Malformed(e.to_string())),
    }
}

#[async_trait]
impl ChannelSender for TelegramSender {
    async fn send(&self, msg: &OutboundMessage) -> Result<SentMessage, SendError> {
        let reply_markup = msg.button.as_ref().map(|b| InlineKeyboard {
            inline_keyboard: [[b]],
        });
        let rb = match &msg.kind {
            MessageKind::Photo { url } => self.client.post(self.endpoint("sendPhoto")).json(&PhotoReq {
                chat_id: &msg.chat_id,
                photo: url,
                caption: &msg.body,
                parse_mode: PARSE_MODE_HTML,
                reply_markup,
            }),
            MessageKind::Text => self.client.post(self.endpoint("sendMessage")).json(&TextReq {
                chat_id: &msg.chat_id,
                text: &msg.body,
                parse_mode: PARSE_MODE_HTML,
                disable_web_page_preview: false,
                reply_markup,
            }),
        };
        let resp = rb.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        classify(status, &body)
    }
}
