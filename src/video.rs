//! Pure `html -> VideoMetadata?` parser. No network, no side effects: the
//! video-page source adapter owns the fetch, this module only interprets
//! the body.

use chrono::NaiveDateTime;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::date_parse::parse_video_datetime;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub upload_date: Option<NaiveDateTime>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub keywords: Vec<String>,
    pub language: Option<String>,
}

pub fn parse_video_metadata(html: &str) -> Option<VideoMetadata> {
    let json_data = extract_video_object(html);
    let meta = extract_meta_tags(html);

    let title = first_non_empty(&[
        json_data.as_ref().and_then(|d| str_field(d, "name")),
        meta.get("og:title").cloned(),
        meta.get("twitter:title").cloned(),
        meta.get("title").cloned(),
    ])?;

    let description = first_non_empty(&[
        json_data.as_ref().and_then(|d| str_field(d, "description")),
        meta.get("description").cloned(),
        meta.get("og:description").cloned(),
    ]);

    let url = first_non_empty(&[
        json_data.as_ref().and_then(|d| str_field(d, "url")),
        json_data
            .as_ref()
            .and_then(|d| d.get("mainEntityOfPage"))
            .and_then(extract_url),
        meta.get("og:url").cloned(),
        meta.get("twitter:url").cloned(),
    ]);

    let upload_date = json_data
        .as_ref()
        .and_then(|d| str_field(d, "uploadDate").or_else(|| str_field(d, "datePublished")))
        .and_then(|s| parse_video_datetime(&s))
        .or_else(|| {
            meta.get("uploaddate")
                .or_else(|| meta.get("article:published_time"))
                .and_then(|s| parse_video_datetime(s))
        });

    let (mut author_name, author_url) = json_data
        .as_ref()
        .map(|d| extract_author(d.get("author").unwrap_or(&Value::Null)))
        .unwrap_or((None, None));
    if author_name.is_none() {
        author_name = first_non_empty(&[meta.get("author").cloned(), meta.get("og:video:actor").cloned()]);
    }

    let mut view_count = json_data.as_ref().and_then(|d| to_int(d.get("viewCount")));
    let mut like_count = json_data.as_ref().and_then(|d| to_int(d.get("likeCount")));
    let mut comment_count = json_data.as_ref().and_then(|d| to_int(d.get("commentCount")));
    if let Some(stats) = json_data.as_ref().and_then(|d| d.get("interactionStatistic")) {
        view_count = view_count.or_else(|| extract_interaction_count(stats, "watch"));
        like_count = like_count.or_else(|| extract_interaction_count(stats, "like"));
        comment_count = comment_count.or_else(|| extract_interaction_count(stats, "comment"));
    }
    if view_count.is_none() {
        view_count = meta
            .get("interactioncount")
            .and_then(|s| to_int_str(s))
            .or_else(|| meta.get("og:video:views").and_then(|s| to_int_str(s)));
    }
    if like_count.is_none() {
        like_count = meta.get("og:video:likes").and_then(|s| to_int_str(s));
    }
    if comment_count.is_none() {
        comment_count = meta.get("commentcount").and_then(|s| to_int_str(s));
    }

    let mut keywords = json_data
        .as_ref()
        .map(|d| normalize_keywords(d.get("keywords").unwrap_or(&Value::Null)))
        .unwrap_or_default();
    if keywords.is_empty() {
        keywords = meta
            .get("keywords")
            .map(|s| normalize_keywords(&Value::String(s.clone())))
            .filter(|v| !v.is_empty())
            .or_else(|| {
                meta.get("og:video:tag")
                    .map(|s| normalize_keywords(&Value::String(s.clone())))
            })
            .unwrap_or_default();
    }

    let mut language = json_data
        .as_ref()
        .and_then(|d| str_field(d, "inLanguage"))
        .and_then(|s| normalize_language(&s));
    if language.is_none() {
        language = meta.get("og:locale").and_then(|s| normalize_language(s));
    }

    Some(VideoMetadata {
        title,
        description,
        url,
        upload_date,
        author_name,
        author_url,
        view_count,
        like_count,
        comment_count,
        keywords,
        language,
    })
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn first_non_empty(candidates: &[Option<String>]) -> Option<String> {
    candidates.iter().flatten().find_map(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Walk every `<script type="application/ld+json">` block and recursively
/// find the first node whose `@type` ends in "videoobject" (case-insensitive).
fn extract_video_object(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let data: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if let Some(found) = find_video_object(&data) {
            return Some(found.clone());
        }
    }
    None
}

fn find_video_object(node: &Value) -> Option<&Value> {
    match node {
        Value::Object(map) => {
            if is_video_type(map.get("@type")) {
                return Some(node);
            }
            for value in map.values() {
                if let Some(found) = find_video_object(value) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(find_video_object),
        _ => None,
    }
}

fn is_video_type(node_type: Option<&Value>) -> bool {
    match node_type {
        Some(Value::String(s)) => s.to_ascii_lowercase().ends_with("videoobject"),
        Some(Value::Array(items)) => items.iter().any(|v| is_video_type(Some(v))),
        _ => false,
    }
}

fn extract_meta_tags(html: &str) -> std::collections::HashMap<String, String> {
    let document = Html::parse_document(html);
    let mut meta = std::collections::HashMap::new();

    if let Ok(meta_selector) = Selector::parse("meta") {
        for element in document.select(&meta_selector) {
            let key = element
                .value()
                .attr("name")
                .or_else(|| element.value().attr("property"))
                .or_else(|| element.value().attr("itemprop"));
            let content = element.value().attr("content");
            if let (Some(key), Some(content)) = (key, content) {
                let key = key.to_ascii_lowercase();
                let content = content.trim().to_string();
                if !content.is_empty() {
                    meta.entry(key).or_insert(content);
                }
            }
        }
    }

    if !meta.contains_key("title") {
        if let Ok(title_selector) = Selector::parse("title") {
            if let Some(element) = document.select(&title_selector).next() {
                let text: String = element.text().collect::<Vec<_>>().join(" ");
                let text = text.trim().to_string();
                if !text.is_empty() {
                    meta.insert("title".to_string(), text);
                }
            }
        }
    }

    meta
}

fn extract_author(author_data: &Value) -> (Option<String>, Option<String>) {
    match author_data {
        Value::Array(items) => {
            for item in items {
                let (name, url) = extract_author(item);
                if name.is_some() {
                    return (name, url);
                }
            }
            (None, None)
        }
        Value::Object(map) => {
            let name = map.get("name").and_then(|v| v.as_str()).map(|s| s.to_string());
            let url = map.get("url").and_then(extract_url);
            (name, url)
        }
        Value::String(s) => (Some(s.clone()), None),
        _ => (None, None),
    }
}

fn extract_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("@id")
            .or_else(|| map.get("url"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

fn extract_interaction_count(data: &Value, interaction: &str) -> Option<i64> {
    let entries: Vec<&Value> = match data {
        Value::Object(_) => vec![data],
        Value::Array(items) => items.iter().collect(),
        _ => return None,
    };
    for entry in entries {
        let Some(map) = entry.as_object() else { continue };
        let Some(type_name) = interaction_type_name(map.get("interactionType")) else { continue };
        if type_name.contains(interaction) {
            return to_int(map.get("userInteractionCount"))
                .or_else(|| to_int(map.get("interactionCount")));
        }
    }
    None
}

fn interaction_type_name(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Object(map) => ["@type", "@id", "name"]
            .iter()
            .find_map(|k| map.get(*k))
            .and_then(|v| v.as_str())
            .map(|s| s.to_ascii_lowercase()),
        Value::String(s) => Some(s.to_ascii_lowercase()),
        _ => None,
    }
}

fn to_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => to_int_str(s),
        _ => None,
    }
}

/// Lenient integer parsing: extract digit runs, concatenate, convert.
fn to_int_str(value: &str) -> Option<i64> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn normalize_keywords(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => {
            let mut seen = Vec::new();
            for part in s.split(|c| c == ',' || c == ';' || c == '|') {
                let part = part.trim();
                if !part.is_empty() && !seen.iter().any(|existing: &String| existing == part) {
                    seen.push(part.to_string());
                }
            }
            seen
        }
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                if let Some(s) = item.as_str() {
                    let cleaned = s.trim();
                    if !cleaned.is_empty() && !out.iter().any(|existing: &String| existing == cleaned) {
                        out.push(cleaned.to_string());
                    }
                }
            }
            out
        }
        _ => Vec::new(),
    }
}

fn normalize_language(value: &str) -> Option<String> {
    let value = value.trim().to_ascii_lowercase();
    if value.is_empty() {
        return None;
    }
    let value = value.split(['-', '_']).next().unwrap_or(&value).to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_LD_FIXTURE: &str = r#"
    <html><head>
    <script type="application/ld+json">
    {
      "@context": "https://schema.org",
      "@type": "VideoObject",
      "name": "Video headline",
      "uploadDate": "2024-05-01T12:34:56Z",
      "url": "https://example.com/watch?v=99",
      "keywords": ["innovation", "trend", "video"],
      "inLanguage": "en-US",
      "interactionStatistic": [
        {"@type": "InteractionCounter", "interactionType": {"@type": "WatchAction"}, "userInteractionCount": 1337},
        {"@type": "InteractionCounter", "interactionType": {"@type": "LikeAction"}, "userInteractionCount": 250},
        {"@type": "InteractionCounter", "interactionType": {"@type": "CommentAction"}, "userInteractionCount": 17}
      ]
    }
    </script>
    </head></html>"#;

    #[test]
    fn extracts_json_ld_video_object_fields() {
        let metadata = parse_video_metadata(JSON_LD_FIXTURE).unwrap();
        assert_eq!(metadata.title, "Video headline");
        assert_eq!(
            metadata.upload_date.unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-05-01 12:34:56"
        );
        assert_eq!(metadata.view_count, Some(1337));
        assert_eq!(metadata.like_count, Some(250));
        assert_eq!(metadata.comment_count, Some(17));
        assert_eq!(metadata.language.as_deref(), Some("en"));
        assert_eq!(metadata.keywords, vec!["innovation", "trend", "video"]);
    }

    #[test]
    fn falls_back_to_meta_tags_when_no_json_ld() {
        let html = r#"<html><head>
        <meta name="og:title" content="Meta title">
        <meta name="interactionCount" content="UserPlays:1024">
        <meta name="keywords" content="alpha, beta; gamma|delta">
        <meta name="og:locale" content="ru_RU">
        </head></html>"#;
        let metadata = parse_video_metadata(html).unwrap();
        assert_eq!(metadata.title, "Meta title");
        assert_eq!(metadata.view_count, Some(1024));
        assert_eq!(
            metadata.keywords,
            vec!["alpha", "beta", "gamma", "delta"]
        );
        assert_eq!(metadata.language.as_deref(), Some("ru"));
    }

    #[test]
    fn returns_none_when_title_is_missing() {
        let html = "<html><head></head><body>no title anywhere</body></html>";
        assert!(parse_video_metadata(html).is_none());
    }
}
