// tests/feed_parsing.rs
//
// Fixture-driven checks of the feed document contract: RSS and Atom blocks,
// upper-case tags, CDATA, HTML entities, image lookup and truncated markup.

mod common;

use chrono::{Duration, Utc};
use newsdesk::ingest::parser::parse_feed;
use newsdesk::ingest::recency::retain_recent;
use newsdesk::model::{FeedSource, Language};

use common::fixture;

#[test]
fn rss_fixture_maps_fields_and_thumbnail() {
    let now = Utc::now();
    let raw = fixture("world_en.rss", &[now - Duration::hours(1), now - Duration::minutes(20)]);
    let src = FeedSource::new("Example World", "https://news.example.test/rss", Language::En);
    let items = parse_feed(&raw, &src);
    assert_eq!(items.len(), 3);

    let first = &items[0];
    assert_eq!(first.title, "Parliament passes new digital rights law");
    assert_eq!(first.title.chars().count(), 40);
    assert_eq!(first.link, "https://news.example.test/world/digital-rights");
    assert_eq!(first.guid, "ex-1001");
    assert_eq!(first.image_url, "https://img.example.test/digital-rights.jpg");
    assert_eq!(
        first.description,
        "Lawmakers approved the bill on Tuesday after months of debate."
    );
    assert_eq!(first.source_id, "example-world");
    assert!(first.published_at.is_some());

    assert_eq!(items[1].image_url, "");
}

#[test]
fn recency_drops_the_archive_item() {
    let now = Utc::now();
    let raw = fixture("world_en.rss", &[now - Duration::hours(1), now - Duration::minutes(20)]);
    let src = FeedSource::new("Example World", "https://news.example.test/rss", Language::En);
    let (kept, dropped) = retain_recent(parse_feed(&raw, &src), now, Duration::hours(6));
    assert_eq!(kept.len(), 2);
    assert_eq!(dropped, 1);
}

#[test]
fn atom_fixture_uses_href_links_and_image_enclosure() {
    let now = Utc::now();
    let raw = fixture("politik_de.atom", &[now - Duration::minutes(30), now - Duration::minutes(10)]);
    let src = FeedSource::new("Beispiel Politik", "https://politik.example.test/feed", Language::De);
    let items = parse_feed(&raw, &src);
    assert_eq!(items.len(), 2);

    let first = &items[0];
    assert_eq!(
        first.title,
        "Bundestag beschließt Gesetz zum Schutz digitaler Rechte"
    );
    assert_eq!(first.link, "https://politik.example.test/artikel/1");
    assert_eq!(first.guid, "urn:example:politik:1");
    assert_eq!(first.image_url, "https://politik.example.test/bild/1.jpg");
    assert_eq!(first.description, "Die Regierung legte den Entwurf im Frühjahr vor.");
    assert_eq!(first.source_language, Language::De);

    // `updated` is used when `published` is missing
    assert!(items[1].published_at.is_some());
    assert_eq!(items[1].link, "https://politik.example.test/artikel/2");
}

#[test]
fn upper_case_tags_cdata_and_entities() {
    let now = Utc::now();
    let raw = fixture("novosti_ru.rss", &[now - Duration::hours(2)]);
    let src = FeedSource::new("Пример Новости", "https://novosti.example.test/rss", Language::Ru);
    let items = parse_feed(&raw, &src);
    assert_eq!(items.len(), 1);

    let it = &items[0];
    assert_eq!(it.title, "Госдума приняла закон о защите цифровых прав граждан");
    assert_eq!(it.link, "https://novosti.example.test/1");
    assert_eq!(it.image_url, "https://novosti.example.test/1.jpg");
    assert_eq!(
        it.description,
        "Законопроект внесло правительство \"в срочном порядке\"."
    );
    assert_eq!(it.source_id, "пример-новости");
}

#[test]
fn truncated_document_keeps_completed_items() {
    let now = Utc::now();
    let raw = fixture("truncated.rss", &[now - Duration::minutes(5)]);
    let src = FeedSource::new("Broken", "https://t.example.test/rss", Language::En);
    let items = parse_feed(&raw, &src);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "First complete item survives a broken document");
}

#[test]
fn non_feed_body_yields_nothing() {
    let src = FeedSource::new("Html", "https://h.example.test", Language::En);
    assert!(parse_feed("<html><body>Not a feed</body></html>", &src).is_empty());
    assert!(parse_feed("", &src).is_empty());
}
