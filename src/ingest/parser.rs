// src/ingest/parser.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::document::{FeedDocument, ItemBlock};
use crate::ingest::{normalize_text, recency::parse_publish_date};
use crate::model::{FeedItem, FeedSource};

const DATE_TAGS: &[&str] = &["pubdate", "published", "updated", "dc:date"];
const DESCRIPTION_TAGS: &[&str] = &["description", "summary", "content:encoded", "content"];

static RE_OG_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta[^>]+property\s*=\s*["']og:image["'][^>]*content\s*=\s*["']([^"']+)["']"#)
        .expect("og:image regex")
});
static RE_IMG_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<img[^>]+src\s*=\s*["']([^"']+)["']"#).expect("img src regex")
});

/// Parse a raw feed body into items tagged with the source's id and language.
pub fn parse_feed(raw: &str, source: &FeedSource) -> Vec<FeedItem> {
    let source_id = source.source_id();
    FeedDocument::parse(raw)
        .items()
        .iter()
        .map(|block| item_from_block(block, source, &source_id))
        .collect()
}

fn item_from_block(block: &ItemBlock, source: &FeedSource, source_id: &str) -> FeedItem {
    let title = block.text("title").map(normalize_text).unwrap_or_default();

    let link = block
        .text("link")
        .map(str::to_string)
        .or_else(|| atom_link(block))
        .unwrap_or_default();

    let guid = block
        .first_text(&["guid", "id"])
        .map(str::to_string)
        .unwrap_or_else(|| link.clone());

    let pub_date = block.first_text(DATE_TAGS).unwrap_or_default().to_string();
    let published_at = parse_publish_date(&pub_date);

    let raw_description = block.first_text(DESCRIPTION_TAGS).unwrap_or_default();

    FeedItem {
        source_id: source_id.to_string(),
        source_name: source.name.clone(),
        source_language: source.language,
        title,
        link,
        guid,
        pub_date,
        published_at,
        description: normalize_text(raw_description),
        image_url: find_image(block, raw_description),
    }
}

fn atom_link(block: &ItemBlock) -> Option<String> {
    let preferred = block
        .elements("link")
        .find(|e| e.attr("rel").map_or(true, |r| r.eq_ignore_ascii_case("alternate")))
        .and_then(|e| e.attr("href"));
    preferred
        .or_else(|| block.attr("link", "href"))
        .map(str::to_string)
}

/// Image lookup order: image enclosure (RSS or Atom), media thumbnail/content, then
/// `og:image` or the first `<img>` in the description. Empty when none.
pub fn find_image(block: &ItemBlock, raw_description: &str) -> String {
    let enclosure = block.elements("enclosure").find(|e| {
        e.attr("type")
            .is_some_and(|t| t.to_ascii_lowercase().starts_with("image/"))
    });
    if let Some(url) = enclosure.and_then(|e| e.attr("url")) {
        return url.trim().to_string();
    }

    let atom_enclosure = block.elements("link").find(|e| {
        e.attr("rel").is_some_and(|r| r.eq_ignore_ascii_case("enclosure"))
            && e.attr("type")
                .is_some_and(|t| t.to_ascii_lowercase().starts_with("image/"))
    });
    if let Some(url) = atom_enclosure.and_then(|e| e.attr("href")) {
        return url.trim().to_string();
    }

    if let Some(url) = block.attr("media:thumbnail", "url") {
        return url.trim().to_string();
    }
    let media_content = block.elements("media:content").find(|e| {
        let medium = e.attr("medium").map(|m| m.eq_ignore_ascii_case("image"));
        let mime = e
            .attr("type")
            .map(|t| t.to_ascii_lowercase().starts_with("image/"));
        medium.or(mime).unwrap_or(true)
    });
    if let Some(url) = media_content.and_then(|e| e.attr("url")) {
        return url.trim().to_string();
    }

    if let Some(c) = RE_OG_IMAGE.captures(raw_description) {
        return c[1].trim().to_string();
    }
    if let Some(c) = RE_IMG_SRC.captures(raw_description) {
        return c[1].trim().to_string();
    }
    block
        .attr("img", "src")
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
