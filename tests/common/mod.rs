// tests/common/mod.rs
//
// Shared builders and stubs for the integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use newsdesk::analyze::{AnalysisRequest, Analyst, TranslationRequest, Translator};
use newsdesk::error::{CollaboratorError, SendError};
use newsdesk::model::Language;
use newsdesk::notify::{ChannelSender, MessageKind, OutboundMessage, SentMessage};
use newsdesk::topic::{next_hour_boundary, Commentary, Topic, SECTION_NEWS};

/// Load `tests/fixtures/<name>` and substitute `__PUB_n__` with `pubs[n-1]`.
/// Atom fixtures get RFC 3339 dates, everything else RFC 2822.
pub fn fixture(name: &str, pubs: &[DateTime<Utc>]) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let mut body = std::fs::read_to_string(&path).expect("read fixture");
    let atom = name.ends_with(".atom");
    for (i, ts) in pubs.iter().enumerate() {
        let formatted = if atom { ts.to_rfc3339() } else { ts.to_rfc2822() };
        body = body.replace(&format!("__PUB_{}__", i + 1), &formatted);
    }
    body
}

/// Minimal RSS 2.0 document from `(title, link, published)` triples.
pub fn rss(items: &[(&str, &str, DateTime<Utc>)]) -> String {
    let mut out = String::from(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>"#);
    for (title, link, ts) in items {
        out.push_str(&format!(
            "<item><title>{title}</title><link>{link}</link><pubDate>{}</pubDate><description>{title}</description></item>",
            ts.to_rfc2822()
        ));
    }
    out.push_str("</channel></rss>");
    out
}

pub fn good_commentary(lang: Language) -> Commentary {
    let (sense, why, view, question) = match lang {
        Language::De => (
            "Der Bundestag hat ein Gesetz verabschiedet.",
            "Es ist wichtig, weil Plattformen neue Pflichten bekommen.",
            "Eine nüchterne Einordnung der Folgen.",
            "Wer kontrolliert die Umsetzung?",
        ),
        Language::Ru => (
            "Госдума приняла закон.",
            "Это важно, потому что платформы получают новые обязанности.",
            "Спокойный взгляд на последствия.",
            "Кто будет контролировать исполнение?",
        ),
        Language::En => (
            "Parliament passed a law.",
            "It matters because platforms gain new duties.",
            "A sober reading of the consequences.",
            "Who will oversee enforcement?",
        ),
    };
    Commentary {
        sense: sense.into(),
        why: why.into(),
        view: view.into(),
        question: question.into(),
    }
}

/// Analyst that answers in the requested language and records every request.
#[derive(Default)]
pub struct StubAnalyst {
    pub requests: Mutex<Vec<AnalysisRequest>>,
}

#[async_trait]
impl Analyst for StubAnalyst {
    async fn analyze(&self, req: &AnalysisRequest) -> Result<Commentary, CollaboratorError> {
        self.requests.lock().unwrap().push(req.clone());
        Ok(good_commentary(req.output_language))
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}

/// Translator that tags texts with the target code, or fails when `fail` is set.
#[derive(Default)]
pub struct StubTranslator {
    pub fail: bool,
    pub requests: Mutex<Vec<TranslationRequest>>,
}

#[async_trait]
impl Translator for StubTranslator {
    async fn translate(&self, req: &TranslationRequest) -> Result<Vec<String>, CollaboratorError> {
        self.requests.lock().unwrap().push(req.clone());
        if self.fail {
            return Err(CollaboratorError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(req
            .texts
            .iter()
            .map(|t| match t.trim() {
                "" => String::new(),
                _ => format!("[{}] {t}", req.to.code()),
            })
            .collect())
    }
}

type SendHook = Box<dyn Fn(&OutboundMessage) + Send + Sync>;

/// Records every send. Photos can be rejected with a client error, and a hook
/// can run before each send (e.g. to simulate a concurrent writer).
pub struct RecordingSender {
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub reject_photos: bool,
    next_id: Mutex<i64>,
    hook: Option<SendHook>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject_photos: false,
            next_id: Mutex::new(100),
            hook: None,
        }
    }

    pub fn rejecting_photos() -> Self {
        Self {
            reject_photos: true,
            ..Self::new()
        }
    }

    pub fn with_hook(mut self, hook: impl Fn(&OutboundMessage) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelSender for RecordingSender {
    async fn send(&self, msg: &OutboundMessage) -> Result<SentMessage, SendError> {
        if let Some(h) = &self.hook {
            h(msg);
        }
        if self.reject_photos && matches!(msg.kind, MessageKind::Photo { .. }) {
            return Err(SendError::Client {
                code: 400,
                description: "Bad Request: wrong type of the web page content".into(),
            });
        }
        self.sent.lock().unwrap().push(msg.clone());
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        Ok(SentMessage { message_id: *id })
    }
}

pub fn topic(id: &str, lang: Language, created_at: DateTime<Utc>) -> Topic {
    let c = good_commentary(lang);
    Topic {
        id: id.into(),
        title: format!("{id} headline long enough to be a real story"),
        sense: c.sense,
        why: c.why,
        view: c.view,
        question: c.question,
        text: None,
        section: SECTION_NEWS.into(),
        language: lang,
        created_at,
        scheduled_for: next_hour_boundary(created_at),
        source_link: format!("https://news.example.test/{id}"),
        source_name: "Example".into(),
        source_published_at: Some(created_at),
        image: String::new(),
        relevance_score: 45,
        quality_score: 30,
        posted: false,
        publication: None,
        translated_from: false,
        source_language: None,
        source_topic_id: None,
    }
}
