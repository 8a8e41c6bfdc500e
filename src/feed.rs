//! RSS 2.0 / Atom 1.0 parser. Recognises `rss/channel/item` and Atom
//! `feed/entry`, extracting a canonical [`SourceItem`] per entry following
//! the field-priority fallback chains from the component design.

use quick_xml::events::Event;
use quick_xml::Reader;
use sha1::{Digest, Sha1};

use crate::date_parse::parse_feed_datetime;
use crate::errors::SourceError;
use crate::model::SourceItem;

#[derive(Default)]
struct RawEntry {
    guid: Option<String>,
    atom_id: Option<String>,
    atom_link_href: Option<String>,
    link_text: Option<String>,
    title: Option<String>,
    pub_date: Option<String>,
    atom_updated: Option<String>,
    atom_published: Option<String>,
    description: Option<String>,
    atom_summary: Option<String>,
    atom_content: Option<String>,
}

/// Field being accumulated while inside an `<item>`/`<entry>` block.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Guid,
    AtomId,
    LinkText,
    Title,
    PubDate,
    AtomUpdated,
    AtomPublished,
    Description,
    AtomSummary,
    AtomContent,
    None,
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Parse an entire feed document. Fails the whole fetch only on an XML
/// well-formedness error; individual malformed entries are skipped.
pub fn parse_feed(xml: &str, source_url: &str) -> Result<Vec<SourceItem>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut items = Vec::new();
    let mut in_entry = false;
    let mut current = RawEntry::default();
    let mut field = Field::None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(SourceError::parse(source_url, e)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref()).to_ascii_lowercase();
                if !in_entry && (name == b"item" || name == b"entry") {
                    in_entry = true;
                    current = RawEntry::default();
                    field = Field::None;
                    continue;
                }
                if in_entry {
                    field = match name.as_slice() {
                        b"guid" => Field::Guid,
                        b"id" => Field::AtomId,
                        b"link" => {
                            // Atom <link href="..."/> with no text content.
                            for attr in e.attributes().flatten() {
                                if local_name(attr.key.as_ref()) == b"href" {
                                    if let Ok(value) = attr.unescape_value() {
                                        if current.atom_link_href.is_none() {
                                            current.atom_link_href = Some(value.to_string());
                                        }
                                    }
                                }
                            }
                            Field::LinkText
                        }
                        b"title" => Field::Title,
                        b"pubdate" => Field::PubDate,
                        b"updated" => Field::AtomUpdated,
                        b"published" => Field::AtomPublished,
                        b"description" => Field::Description,
                        b"summary" => Field::AtomSummary,
                        b"content" | b"encoded" => Field::AtomContent,
                        _ => Field::None,
                    };
                }
            }
            Ok(Event::Empty(e)) => {
                if in_entry {
                    let name = local_name(e.name().as_ref()).to_ascii_lowercase();
                    if name == b"link" {
                        for attr in e.attributes().flatten() {
                            if local_name(attr.key.as_ref()) == b"href" {
                                if let Ok(value) = attr.unescape_value() {
                                    if current.atom_link_href.is_none() {
                                        current.atom_link_href = Some(value.to_string());
                                    }
                                }
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if field == Field::None {
                    continue;
                }
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if text.is_empty() {
                    continue;
                }
                match field {
                    Field::Guid => set_once(&mut current.guid, text),
                    Field::AtomId => set_once(&mut current.atom_id, text),
                    Field::LinkText => set_once(&mut current.link_text, text),
                    Field::Title => set_once(&mut current.title, text),
                    Field::PubDate => set_once(&mut current.pub_date, text),
                    Field::AtomUpdated => set_once(&mut current.atom_updated, text),
                    Field::AtomPublished => set_once(&mut current.atom_published, text),
                    Field::Description => set_once(&mut current.description, text),
                    Field::AtomSummary => set_once(&mut current.atom_summary, text),
                    Field::AtomContent => set_once(&mut current.atom_content, text),
                    Field::None => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name().as_ref()).to_ascii_lowercase();
                if in_entry && (name == b"item" || name == b"entry") {
                    in_entry = false;
                    if let Some(item) = finish_entry(std::mem::take(&mut current)) {
                        items.push(item);
                    }
                    field = Field::None;
                } else if in_entry {
                    field = Field::None;
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn finish_entry(raw: RawEntry) -> Option<SourceItem> {
    let url = raw
        .link_text
        .clone()
        .or_else(|| raw.atom_link_href.clone())
        .unwrap_or_default();

    let title = raw
        .title
        .unwrap_or_else(|| "(без названия)".to_string())
        .trim()
        .to_string();

    let published_text = raw
        .pub_date
        .or(raw.atom_updated)
        .or(raw.atom_published);
    let published = published_text
        .as_deref()
        .and_then(parse_feed_datetime)
        .unwrap_or_else(|| {
            tracing::debug!(raw = ?published_text, "unable to parse feed date, using current time");
            chrono::Utc::now().naive_utc()
        });

    let summary = raw.description.or(raw.atom_summary).or(raw.atom_content);

    let id = raw
        .guid
        .or(raw.atom_id)
        .or_else(|| raw.atom_link_href.clone())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| synthesize_id(&url, &title, &published));

    Some(SourceItem {
        id,
        title,
        url,
        published,
        summary,
        language: None,
    })
}

fn synthesize_id(url: &str, title: &str, published: &chrono::NaiveDateTime) -> String {
    let canonical = format!("{}|{}|{}", url, title, published.format("%Y-%m-%dT%H:%M:%S"));
    let mut hasher = Sha1::new();
    hasher.update(canonical.as_bytes());
    format!("sha1:{:x}", hasher.finalize())
}
