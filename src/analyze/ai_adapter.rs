//! Language-service adapters: the analysis collaborator and the translator.
//!
//! Both are black boxes behind traits so the pipeline and the tests never
//! depend on a live provider. The production implementation talks to the
//! OpenAI chat-completions API and asks for JSON output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CollaboratorError;
use crate::model::Language;
use crate::topic::Commentary;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Input for one analysis call. Title and description are already in the
/// analysis language; the commentary is written in `output_language`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub title: String,
    pub description: String,
    pub source_name: String,
    pub link: String,
    pub output_language: Language,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub from: Option<Language>,
    pub to: Language,
    pub texts: Vec<String>,
}

#[async_trait]
pub trait Analyst: Send + Sync {
    /// Produce the four-part commentary. Incomplete output is an error.
    async fn analyze(&self, req: &AnalysisRequest) -> Result<Commentary, CollaboratorError>;
    fn provider_name(&self) -> &'static str;
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate every text; the output has the same length and order.
    async fn translate(&self, req: &TranslationRequest) -> Result<Vec<String>, CollaboratorError>;
}

pub type DynAnalyst = Arc<dyn Analyst>;
pub type DynTranslator = Arc<dyn Translator>;

/// Settings for the OpenAI-backed services.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Factory: `AI_TEST_MODE=mock` returns deterministic mocks, otherwise the
/// OpenAI client serves both roles.
pub fn build_services(
    settings: &AiSettings,
    mock: bool,
) -> Result<(DynAnalyst, DynTranslator), CollaboratorError> {
    if mock {
        return Ok((Arc::new(MockAnalyst::default()), Arc::new(MockTranslator)));
    }
    let client = Arc::new(OpenAiClient::new(settings)?);
    Ok((client.clone(), client))
}

// ------------------------------------------------------------
// OpenAI client
// ------------------------------------------------------------

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawCommentary {
    sense: String,
    why: String,
    view: String,
    question: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawTranslations {
    translations: Vec<String>,
}

impl OpenAiClient {
    pub fn new(settings: &AiSettings) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder()
            .user_agent("newsdesk/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// One JSON-mode chat completion; returns the message content.
    async fn complete_json(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let req = ChatReq {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.3,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                body: truncate(&body, 300),
            });
        }

        let body: ChatResp = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CollaboratorError::Incomplete("empty completion".into()))
    }
}

fn analysis_prompt(lang: Language) -> String {
    format!(
        "You are a news analyst writing for a {lang} language channel. \
Return a JSON object with exactly these string fields, all written in {lang}: \
\"sense\" (the essence of the news in 240-360 characters), \
\"why\" (why it matters; name the cause explicitly), \
\"view\" (a calm analytical perspective, no calls to action and no moralizing), \
\"question\" (one specific open question for readers, ending with a question mark). \
Output only the JSON object.",
        lang = lang.english_name()
    )
}

fn translation_prompt(req: &TranslationRequest) -> String {
    let from = req
        .from
        .map(|l| format!(" from {}", l.english_name()))
        .unwrap_or_default();
    format!(
        "Translate each string of the input JSON array{from} into {to}. \
Keep meaning, names and numbers; do not add commentary. \
Return a JSON object {{\"translations\": [...]}} with the same number of strings in the same order.",
        to = req.to.english_name()
    )
}

#[async_trait]
impl Analyst for OpenAiClient {
    async fn analyze(&self, req: &AnalysisRequest) -> Result<Commentary, CollaboratorError> {
        let user = format!(
            "Source: {}\nTitle: {}\nSummary: {}\nLink: {}",
            req.source_name, req.title, req.description, req.link
        );
        let content = self
            .complete_json(&analysis_prompt(req.output_language), &user)
            .await?;
        parse_commentary(&content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[async_trait]
impl Translator for OpenAiClient {
    async fn translate(&self, req: &TranslationRequest) -> Result<Vec<String>, CollaboratorError> {
        if req.texts.is_empty() {
            return Ok(Vec::new());
        }
        let input = serde_json::to_string(&req.texts)
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;
        let content = self.complete_json(&translation_prompt(req), &input).await?;
        parse_translations(&content, &req.texts)
    }
}

/// Decode and validate the analysis JSON.
pub fn parse_commentary(content: &str) -> Result<Commentary, CollaboratorError> {
    let raw: RawCommentary =
        serde_json::from_str(content).map_err(|e| CollaboratorError::Decode(e.to_string()))?;
    let c = Commentary {
        sense: sanitize_field(&raw.sense),
        why: sanitize_field(&raw.why),
        view: sanitize_field(&raw.view),
        question: sanitize_field(&raw.question),
    };
    match c.first_missing() {
        Some(field) => Err(CollaboratorError::Incomplete(format!("missing `{field}`"))),
        None => Ok(c),
    }
}

/// Decode the translation JSON. The count must match `inputs`, and every
/// non-blank input needs a non-blank translation; blank inputs stay blank.
pub fn parse_translations(content: &str, inputs: &[String]) -> Result<Vec<String>, CollaboratorError> {
    let raw: RawTranslations =
        serde_json::from_str(content).map_err(|e| CollaboratorError::Decode(e.to_string()))?;
    let out: Vec<String> = raw.translations.iter().map(|s| sanitize_field(s)).collect();
    let missing = inputs
        .iter()
        .zip(&out)
        .filter(|(src, t)| !src.trim().is_empty() && t.is_empty())
        .count();
    if out.len() != inputs.len() || missing > 0 {
        return Err(CollaboratorError::Incomplete(format!(
            "expected {} translations, got {} usable",
            inputs.len(),
            out.len().min(inputs.len()) - missing
        )));
    }
    Ok(inputs
        .iter()
        .zip(out)
        .map(|(src, t)| if src.trim().is_empty() { String::new() } else { t })
        .collect())
}

// ------------------------------------------------------------
// Mocks (AI_TEST_MODE=mock and tests)
// ------------------------------------------------------------

/// Deterministic analyst: returns `fixed` when set, else a commentary derived from the title.
#[derive(Debug, Clone, Default)]
pub struct MockAnalyst {
    pub fixed: Option<Commentary>,
}

#[async_trait]
impl Analyst for MockAnalyst {
    async fn analyze(&self, req: &AnalysisRequest) -> Result<Commentary, CollaboratorError> {
        if let Some(c) = &self.fixed {
            return Ok(c.clone());
        }
        Ok(Commentary {
            sense: format!("{} (mock summary)", req.title),
            why: format!("It matters because {}", req.source_name),
            view: "A measured reading of the available facts.".to_string(),
            question: format!("What changes next after \"{}\"?", req.title),
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Tags each text with the target language code, e.g. `[de] Title`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockTranslator;

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, req: &TranslationRequest) -> Result<Vec<String>, CollaboratorError> {
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

// ------------------------------------------------------------
// Sanitization
// ------------------------------------------------------------

/// Single line, collapsed whitespace, trimmed.
pub fn sanitize_field(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
