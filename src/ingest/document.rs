// src/ingest/document.rs
//! Tolerant feed document model.
//!
//! `FeedDocument` exposes exactly two things to the rest of the pipeline:
//! the list of item blocks (`<item>` for RSS, `<entry>` for Atom) and the
//! text or attributes of a named tag inside a block. The contract:
//! - tag and attribute names match case-insensitively (`pubDate` == `pubdate`);
//! - CDATA sections are plain text;
//! - a missing optional tag is `None`, never an error;
//! - undeclared HTML entities are decoded instead of failing the document;
//! - malformed markup stops parsing, but every block completed before it is kept.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use tracing::debug;

/// One element found inside an item block. Nested elements are flattened
/// into the block; an element's text includes the text of its descendants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Lower-cased qualified name, e.g. `media:thumbnail`.
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemBlock {
    elements: Vec<Element>,
}

impl ItemBlock {
    /// Text of the first `tag` element with non-blank content.
    pub fn text(&self, tag: &str) -> Option<&str> {
        self.elements(tag)
            .map(|e| e.text.trim())
            .find(|t| !t.is_empty())
    }

    /// First non-blank text among `tags`, in preference order.
    pub fn first_text(&self, tags: &[&str]) -> Option<&str> {
        tags.iter().find_map(|t| self.text(t))
    }

    /// Attribute `attr` of the first `tag` element that carries it.
    pub fn attr(&self, tag: &str, attr: &str) -> Option<&str> {
        self.elements(tag).find_map(|e| e.attr(attr))
    }

    pub fn elements<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a Element> + 'a {
        let tag = tag.to_ascii_lowercase();
        self.elements.iter().filter(move |e| e.name == tag)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    items: Vec<ItemBlock>,
}

impl FeedDocument {
    pub fn parse(raw: &str) -> Self {
        let cleaned = scrub_for_xml(raw);
        let mut reader = Reader::from_str(&cleaned);
        {
            let cfg = reader.config_mut();
            cfg.trim_text(true);
            cfg.check_end_names = false;
        }

        let mut items = Vec::new();
        let mut current: Option<BlockBuilder> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = lower_name(&e);
                    match current.as_mut() {
                        Some(b) => b.open(name, read_attrs(&e)),
                        None if is_block_tag(&name) => current = Some(BlockBuilder::default()),
                        None => {}
                    }
                }
                Ok(Event::Empty(e)) => {
                    if let Some(b) = current.as_mut() {
                        b.leaf(lower_name(&e), read_attrs(&e));
                    }
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                    let closes_block = is_block_tag(&name)
                        && current.as_ref().is_some_and(|b| !b.has_open(&name));
                    if closes_block {
                        if let Some(b) = current.take() {
                            items.push(b.finish());
                        }
                    } else if let Some(b) = current.as_mut() {
                        b.close(&name);
                    }
                }
                Ok(Event::Text(t)) => {
                    if let Some(b) = current.as_mut() {
                        b.text(&decode_text(&t));
                    }
                }
                Ok(Event::CData(c)) => {
                    if let Some(b) = current.as_mut() {
                        b.text(&String::from_utf8_lossy(&c));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    debug!(
                        target: "fetch",
                        error = %e,
                        position = reader.buffer_position(),
                        kept = items.len(),
                        "feed markup error, keeping completed items"
                    );
                    break;
                }
                _ => {}
            }
        }

        Self { items }
    }

    pub fn items(&self) -> &[ItemBlock] {
        &self.items
    }
}

#[derive(Default)]
struct BlockBuilder {
    elements: Vec<Element>,
    open: Vec<usize>,
}

impl BlockBuilder {
    fn open(&mut self, name: String, attrs: Vec<(String, String)>) {
        self.elements.push(Element {
            name,
            attrs,
            text: String::new(),
        });
        self.open.push(self.elements.len() - 1);
    }

    fn leaf(&mut self, name: String, attrs: Vec<(String, String)>) {
        self.elements.push(Element {
            name,
            attrs,
            text: String::new(),
        });
    }

    fn has_open(&self, name: &str) -> bool {
        self.open.iter().any(|&i| self.elements[i].name == name)
    }

    /// Close the innermost open element named `name`, together with any
    /// unclosed elements nested in it (e.g. HTML `<br>` inside a description).
    fn close(&mut self, name: &str) {
        if let Some(pos) = self
            .open
            .iter()
            .rposition(|&i| self.elements[i].name == name)
        {
            self.open.truncate(pos);
        }
    }

    fn text(&mut self, chunk: &str) {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            return;
        }
        for &i in &self.open {
            let t = &mut self.elements[i].text;
            if !t.is_empty() {
                t.push(' ');
            }
            t.push_str(chunk);
        }
    }

    fn finish(self) -> ItemBlock {
        ItemBlock {
            elements: self.elements,
        }
    }
}

fn is_block_tag(name: &str) -> bool {
    name == "item" || name == "entry"
}

fn lower_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase()
}

fn read_attrs(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .with_checks(false)
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_ascii_lowercase();
            let value = a
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| {
                    html_escape::decode_html_entities(&String::from_utf8_lossy(&a.value))
                        .into_owned()
                });
            (key, value)
        })
        .collect()
}

fn decode_text(t: &BytesText<'_>) -> String {
    match t.unescape() {
        Ok(s) => s.into_owned(),
        Err(_) => html_escape::decode_html_entities(&String::from_utf8_lossy(t)).into_owned(),
    }
}

/// Strip a BOM and anything before the first tag, and map common HTML-only
/// entities to numeric references so the XML reader accepts them.
fn scrub_for_xml(s: &str) -> String {
    let s = s.trim_start_matches('\u{FEFF}');
    let s = match s.find('<') {
        Some(i) => &s[i..],
        None => s,
    };
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&laquo;", "&#171;")
        .replace("&raquo;", "&#187;")
        .replace("&ldquo;", "&#8220;")
        .replace("&rdquo;", "&#8221;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rsquo;", "&#8217;")
        .replace("&hellip;", "&#8230;")
}
