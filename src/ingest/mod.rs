// src/ingest/mod.rs
pub mod dedup;
pub mod document;
pub mod fetcher;
pub mod parser;
pub mod recency;

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::ingest::fetcher::FeedFetcher;
use crate::model::{FeedItem, FeedSource};

/// Max characters kept from any feed text field.
const TEXT_CAP: usize = 1500;

/// Normalize feed text: decode entities, strip tags, unify quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z!][^>]*>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” „ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{201E}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    // 5) Length cap
    if out.chars().count() > TEXT_CAP {
        out = out.chars().take(TEXT_CAP).collect();
    }

    out
}

/// Lower-case slug: alphanumerics kept, every other run collapsed to `-`.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Short anonymized id for log lines; raw feed text is never logged.
pub fn anon_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

/// Fetch every source in order. A failing source contributes nothing.
pub async fn collect_items(fetcher: &dyn FeedFetcher, sources: &[FeedSource]) -> Vec<FeedItem> {
    let mut raw = Vec::new();
    for src in sources {
        raw.extend(fetcher.fetch(src).await);
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_markup_and_collapses_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b></p> &ldquo;ok&rdquo;  ";
        assert_eq!(normalize_text(s), "Hello, world \"ok\"");
    }

    #[test]
    fn normalize_text_keeps_question_marks() {
        assert_eq!(normalize_text("Is it over?"), "Is it over?");
    }

    #[test]
    fn normalize_text_leaves_comparisons_alone() {
        assert_eq!(normalize_text("growth < 2% and > 1%"), "growth < 2% and > 1%");
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("BBC News — World"), "bbc-news-world");
        assert_eq!(slugify("  Медуза  "), "медуза");
        assert_eq!(slugify("Spiegel: Politik!"), "spiegel-politik");
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        assert_eq!(anon_hash("abc"), anon_hash("abc"));
        assert_eq!(anon_hash("abc").len(), 12);
    }
}
