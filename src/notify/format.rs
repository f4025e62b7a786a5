// src/notify/format.rs
//! HTML rendering of a topic for the channel.

use html_escape::encode_text;

use crate::model::Language;
use crate::notify::{LinkButton, MessageKind, OutboundMessage};
use crate::topic::Topic;

/// Telegram caption limit for photos (characters after entity parsing; we
/// count the raw HTML, which is stricter).
pub const CAPTION_LIMIT: usize = 1024;
pub const TEXT_LIMIT: usize = 4096;

const TITLE_CAP: usize = 300;
const FIELD_CAP: usize = 900;
const BODY_CAP: usize = 3500;

struct Labels {
    why: &'static str,
    view: &'static str,
    question: &'static str,
    source: &'static str,
}

fn labels(lang: Language) -> Labels {
    match lang {
        Language::Ru => Labels {
            why: "Почему это важно",
            view: "Взгляд",
            question: "Вопрос",
            source: "Источник",
        },
        Language::En => Labels {
            why: "Why it matters",
            view: "Perspective",
            question: "Question",
            source: "Source",
        },
        Language::De => Labels {
            why: "Warum es wichtig ist",
            view: "Einordnung",
            question: "Frage",
            source: "Quelle",
        },
    }
}

fn clip(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn esc(s: &str, max: usize) -> String {
    encode_text(&clip(s, max)).into_owned()
}

/// Message body in HTML parse mode. Every piece of topic text is escaped.
pub fn render_body(topic: &Topic) -> String {
    let title = esc(&topic.title, TITLE_CAP);
    if !topic.is_structured() {
        let body = esc(topic.text.as_deref().unwrap_or_default(), BODY_CAP);
        return if body.is_empty() {
            format!("<b>{title}</b>")
        } else {
            format!("<b>{title}</b>\n\n{body}")
        };
    }
    let l = labels(topic.language);
    format!(
        "<b>{title}</b>\n\n{sense}\n\n<b>{why_l}:</b> {why}\n\n<b>{view_l}:</b> {view}\n\n<b>{q_l}:</b> {question}",
        sense = esc(&topic.sense, FIELD_CAP),
        why_l = l.why,
        why = esc(&topic.why, FIELD_CAP),
        view_l = l.view,
        view = esc(&topic.view, FIELD_CAP),
        q_l = l.question,
        question = esc(&topic.question, FIELD_CAP),
    )
}

/// Photo with caption when the topic has an image and the caption fits,
/// otherwise a text message.
pub fn build_message(topic: &Topic, chat_id: &str) -> OutboundMessage {
    let body = render_body(topic);
    let image = topic.image.trim();
    let kind = if !image.is_empty() && body.chars().count() <= CAPTION_LIMIT {
        MessageKind::Photo {
            url: image.to_string(),
        }
    } else {
        MessageKind::Text
    };
    let button = (!topic.source_link.trim().is_empty()).then(|| LinkButton {
        text: labels(topic.language).source.to_string(),
        url: topic.source_link.trim().to_string(),
    });
    OutboundMessage {
        chat_id: chat_id.to_string(),
        kind,
        body,
        button,
    }
}
