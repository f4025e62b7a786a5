// src/analyze/quality.rs
//! Quality heuristic over a finished commentary, and the final ranking.
//!
//! Four checks worth 10 points each:
//! - `sense` length (in characters) within `[240, 360]`
//! - `why` contains a causal connective
//! - `view` free of imperative or moralizing phrasing
//! - `question` contains `?` and no generic phrasing
//!
//! Lexicons cover ru/en/de. Entries match whole words on lower-cased text;
//! a trailing `*` marks a stem.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyze::selector::AnalyzedCandidate;
use crate::topic::Commentary;

pub const CHECK_POINTS: i32 = 10;
pub const SENSE_MIN_CHARS: usize = 240;
pub const SENSE_MAX_CHARS: usize = 360;

const CAUSAL: &[&str] = &[
    // en
    "because", "due to", "as a result", "therefore", "since", "leads to", "caused by",
    "so that", "consequently",
    // ru
    "потому что", "поскольку", "так как", "из-за", "в результате", "поэтому",
    "вследствие", "благодаря",
    // de
    "weil", "da", "deshalb", "daher", "aufgrund", "infolge", "führt zu", "wegen",
];

const IMPERATIVE: &[&str] = &[
    // en
    "we must", "you must", "you should", "we should", "everyone should", "it is shameful",
    "shame on", "don't let", "must be stopped",
    // ru
    "мы должны", "вы должны", "нужно срочно", "стыдно", "позор*", "давайте",
    "необходимо немедленно",
    // de
    "wir müssen", "sie müssen", "man muss", "sollten wir", "schande*", "lasst uns",
];

const GENERIC_QUESTION: &[&str] = &[
    // en
    "what do you think", "your opinion", "what's your take", "agree or disagree",
    // ru
    "что вы думаете", "ваше мнение", "как вы считаете", "согласны ли вы",
    // de
    "was denken sie", "was meinen sie", "ihre meinung", "was halten sie davon",
];

static RE_CAUSAL: Lazy<Regex> = Lazy::new(|| lexicon(CAUSAL));
static RE_IMPERATIVE: Lazy<Regex> = Lazy::new(|| lexicon(IMPERATIVE));
static RE_GENERIC_QUESTION: Lazy<Regex> = Lazy::new(|| lexicon(GENERIC_QUESTION));

fn lexicon(entries: &[&str]) -> Regex {
    let alts: Vec<String> = entries
        .iter()
        .map(|e| match e.strip_suffix('*') {
            Some(stem) => regex::escape(stem),
            None => format!(r"{}\b", regex::escape(e)),
        })
        .collect();
    Regex::new(&format!(r"\b(?:{})", alts.join("|"))).expect("quality lexicon regex")
}

fn contains_any(text: &str, lexicon: &Regex) -> bool {
    lexicon.is_match(&text.to_lowercase())
}

/// Quality score in `0..=40`.
pub fn quality_score(c: &Commentary) -> i32 {
    let mut score = 0;

    let sense_len = c.sense.trim().chars().count();
    if (SENSE_MIN_CHARS..=SENSE_MAX_CHARS).contains(&sense_len) {
        score += CHECK_POINTS;
    }
    if contains_any(&c.why, &RE_CAUSAL) {
        score += CHECK_POINTS;
    }
    if !c.view.trim().is_empty() && !contains_any(&c.view, &RE_IMPERATIVE) {
        score += CHECK_POINTS;
    }
    if c.question.contains('?') && !contains_any(&c.question, &RE_GENERIC_QUESTION) {
        score += CHECK_POINTS;
    }
    score
}

/// Winning candidate together with its scores.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub candidate: AnalyzedCandidate,
    pub quality: i32,
}

impl RankedCandidate {
    pub fn total(&self) -> i32 {
        self.quality + self.candidate.relevance
    }
}

/// Pick the candidate maximizing `quality + relevance`; the earlier one wins ties.
pub fn pick_best(candidates: Vec<AnalyzedCandidate>) -> Option<RankedCandidate> {
    let mut best: Option<RankedCandidate> = None;
    for candidate in candidates {
        let ranked = RankedCandidate {
            quality: quality_score(&candidate.commentary),
            candidate,
        };
        match &best {
            Some(b) if b.total() >= ranked.total() => {}
            _ => best = Some(ranked),
        }
    }
    best
}
