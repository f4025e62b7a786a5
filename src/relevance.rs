// src/relevance.rs
//! Relevance scoring as a pure function over a declarative rule table.
//!
//! The table maps a category id to a keyword set and a weight, with two
//! optional conditions (`unless_any`, `only_below`). Keyword content lives in
//! `config/relevance.toml`; nothing here knows what the keywords are.
//!
//! Keywords match whole words. A trailing `*` turns a keyword into a stem
//! that matches at the start of a word (`санкци*` covers `санкции`,
//! `санкциях`), which the inflected ru/de vocabularies rely on.

use anyhow::{anyhow, bail, Context};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::model::FeedItem;

pub const DEFAULT_RULES_TOML: &str = include_str!("../config/relevance.toml");
pub const ENV_RELEVANCE_RULES_PATH: &str = "RELEVANCE_RULES_PATH";

pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 100;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub weight: i32,
    pub keywords: Vec<String>,
    /// Skip this rule when any of these categories also matched.
    #[serde(default)]
    pub unless_any: Vec<String>,
    /// Apply only while the running score is still below this value.
    #[serde(default)]
    pub only_below: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleTable {
    pub rules: Vec<Rule>,
    /// One compiled keyword matcher per rule, same order as `rules`.
    #[serde(skip)]
    matchers: Vec<Option<Regex>>,
}

/// Result of scoring one text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relevance {
    pub score: i32,
    /// Categories that contributed, in table order.
    pub matched: Vec<String>,
    /// Categories that matched but were suppressed by a condition.
    pub reasons: Vec<String>,
}

/// An item together with its relevance score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredItem {
    pub item: FeedItem,
    pub score: i32,
}

impl RuleTable {
    /// The embedded default table.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_toml_str(DEFAULT_RULES_TOML).context("embedded relevance rules")
    }

    /// Rules from `path` when given, else the embedded default.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("reading relevance rules from {}", path.display()))?;
                Self::from_toml_str(&content)
            }
            None => Self::builtin(),
        }
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut table: RuleTable = toml::from_str(s)?;

        let mut ids = HashSet::new();
        for r in &table.rules {
            if !ids.insert(r.id.as_str()) {
                bail!("duplicate relevance rule `{}`", r.id);
            }
        }
        for r in &table.rules {
            if let Some(unknown) = r.unless_any.iter().find(|u| !ids.contains(u.as_str())) {
                return Err(anyhow!(
                    "rule `{}` refers to unknown category `{unknown}`",
                    r.id
                ));
            }
        }

        for r in &mut table.rules {
            r.keywords = r
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty() && k != "*")
                .collect();
        }
        table.matchers = table
            .rules
            .iter()
            .map(|r| {
                keyword_matcher(&r.keywords)
                    .with_context(|| format!("keywords of relevance rule `{}`", r.id))
            })
            .collect::<anyhow::Result<_>>()?;
        Ok(table)
    }

    /// Score already lower-cased text.
    pub fn score_text(&self, lower: &str) -> Relevance {
        let hit: HashSet<&str> = self
            .rules
            .iter()
            .zip(&self.matchers)
            .filter(|(_, m)| m.as_ref().is_some_and(|m| m.is_match(lower)))
            .map(|(r, _)| r.id.as_str())
            .collect();

        let mut rel = Relevance::default();
        let mut running = 0i32;
        for r in &self.rules {
            if !hit.contains(r.id.as_str()) {
                continue;
            }
            if r.unless_any.iter().any(|u| hit.contains(u.as_str())) {
                rel.reasons.push(format!("{}:unless", r.id));
                continue;
            }
            if r.only_below.is_some_and(|ceiling| running >= ceiling) {
                rel.reasons.push(format!("{}:above_ceiling", r.id));
                continue;
            }
            running += r.weight;
            rel.matched.push(r.id.clone());
        }
        rel.score = running.clamp(MIN_SCORE, MAX_SCORE);
        rel
    }

    pub fn score(&self, item: &FeedItem) -> i32 {
        self.score_text(&item.scoring_text()).score
    }

    pub fn score_all(&self, items: Vec<FeedItem>) -> Vec<ScoredItem> {
        items
            .into_iter()
            .map(|item| ScoredItem {
                score: self.score(&item),
                item,
            })
            .collect()
    }
}

/// `\b(?:word\b|stem)` over all keywords of a rule; `None` for a rule
/// without keywords.
fn keyword_matcher(keywords: &[String]) -> Result<Option<Regex>, regex::Error> {
    if keywords.is_empty() {
        return Ok(None);
    }
    let alts: Vec<String> = keywords
        .iter()
        .map(|k| match k.strip_suffix('*') {
            Some(stem) => regex::escape(stem.trim_end()),
            None => format!(r"{}\b", regex::escape(k)),
        })
        .collect();
    Regex::new(&format!(r"\b(?:{})", alts.join("|"))).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TOML: &str = r#"
[[rules]]
id = "intl"
weight = 25
keywords = ["summit"]

[[rules]]
id = "gov"
weight = 20
keywords = ["parliament"]

[[rules]]
id = "crime"
weight = -15
unless_any = ["intl", "gov"]
keywords = ["robbery"]

[[rules]]
id = "bait"
weight = -10
only_below = 20
keywords = ["shocking"]
"#;

    fn table() -> RuleTable {
        RuleTable::from_toml_str(TEST_TOML).expect("test rules")
    }

    #[test]
    fn embedded_table_loads() {
        let t = RuleTable::builtin().expect("builtin");
        assert_eq!(t.rules.len(), 8);
    }

    #[test]
    fn categories_count_once() {
        let r = table().score_text("summit summit summit");
        assert_eq!(r.score, 25);
        assert_eq!(r.matched, vec!["intl".to_string()]);
    }

    #[test]
    fn crime_penalty_is_waived_next_to_governance() {
        assert_eq!(table().score_text("robbery").score, 0);
        let r = table().score_text("parliament debates robbery");
        assert_eq!(r.score, 20);
        assert!(r.reasons.iter().any(|x| x == "crime:unless"));
    }

    #[test]
    fn clickbait_penalty_only_below_ceiling() {
        assert_eq!(table().score_text("shocking summit").score, 25);
        let r = table().score_text("shocking");
        assert_eq!(r.score, 0, "clamped at zero");
        assert_eq!(r.matched, vec!["bait".to_string()]);
    }

    #[test]
    fn rules_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("rules.toml");
        fs::write(&p, TEST_TOML).unwrap();
        let t = RuleTable::load(Some(&p)).unwrap();
        assert_eq!(t.rules.len(), 4);
        assert!(RuleTable::load(Some(&tmp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn unknown_unless_reference_is_rejected() {
        let bad = r#"
[[rules]]
id = "a"
weight = 1
keywords = ["x"]
unless_any = ["nope"]
"#;
        assert!(RuleTable::from_toml_str(bad).is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let bad = r#"
[[rules]]
id = "a"
weight = 1
keywords = ["x"]

[[rules]]
id = "a"
weight = 2
keywords = ["y"]
"#;
        assert!(RuleTable::from_toml_str(bad).is_err());
    }
}
