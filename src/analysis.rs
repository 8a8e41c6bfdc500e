//! Language detection, tokenisation, language-specific normalisation, and
//! exponential time-decayed trend scoring.

use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

use chrono::{NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{SourceItem, Trend};

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w\-']{3,}").expect("static regex"));

static EN_STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "with", "from", "that", "this", "have", "your", "about", "into",
        "after", "will", "trend", "news",
    ]
    .into_iter()
    .collect()
});

static RU_STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "это", "как", "так", "она", "они", "или", "если", "чтобы", "когда", "будет", "которые",
        "также", "тренд", "новости",
    ]
    .into_iter()
    .collect()
});

static DEFAULT_STOPWORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    let mut set: HashSet<String> = EN_STOPWORDS.iter().map(|s| s.to_string()).collect();
    set.extend(RU_STOPWORDS.iter().map(|s| s.to_string()));
    set.insert("новое".to_string());
    set.insert("new".to_string());
    set
});

const EN_SUFFIXES: &[&str] = &[
    "ingly", "ously", "ations", "ation", "ments", "ment", "ings", "ing", "ers", "er", "ed", "ies",
    "s",
];

const RU_SUFFIXES: &[&str] = &[
    "иями", "ями", "ами", "ов", "ев", "ых", "их", "ым", "им", "ах", "ях", "ый", "ий", "ое", "ая",
    "ые", "ие", "ии", "ую", "ешь", "ешься", "ете", "етеся",
];

/// Counts Latin vs Cyrillic letters; `ru` requires cyrillic >= 1.2x latin,
/// `en` requires the inverse, ties (or no letters) fall through to `other`.
pub fn detect_language(text: &str) -> &'static str {
    if text.is_empty() {
        return "other";
    }
    let mut latin = 0u32;
    let mut cyrillic = 0u32;
    for ch in text.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_lowercase() {
            latin += 1;
        } else {
            let lower_cyr = ch.to_lowercase().next().unwrap_or(ch);
            if ('а'..='я').contains(&lower_cyr) || lower_cyr == 'ё' {
                cyrillic += 1;
            }
        }
    }
    if cyrillic > 0 && (cyrillic as f64) >= (latin as f64) * 1.2 {
        "ru"
    } else if latin > 0 && (latin as f64) >= (cyrillic as f64) * 1.2 {
        "en"
    } else {
        "other"
    }
}

/// Tokenise, normalise, and drop stopwords/too-short tokens for `text`.
pub fn extract_keywords(text: &str, language: Option<&str>) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let language = language.map(str::to_string).unwrap_or_else(|| detect_language(text).to_string());
    let lowered = text.to_lowercase();
    let stopwords: &HashSet<String> = match language.as_str() {
        "en" => {
            static EN_SET: Lazy<HashSet<String>> =
                Lazy::new(|| EN_STOPWORDS.iter().map(|s| s.to_string()).collect());
            &EN_SET
        }
        "ru" => {
            static RU_SET: Lazy<HashSet<String>> =
                Lazy::new(|| RU_STOPWORDS.iter().map(|s| s.to_string()).collect());
            &RU_SET
        }
        _ => &DEFAULT_STOPWORDS,
    };

    WORD_RE
        .find_iter(&lowered)
        .map(|m| normalize_token(m.as_str(), &language))
        .filter(|token| !token.is_empty() && token.chars().count() > 2 && !stopwords.contains(token))
        .collect()
}

fn normalize_token(raw: &str, language: &str) -> String {
    let trimmed = raw.trim_matches(|c| c == '-' || c == '\'' || c == '"');
    let token: String = trimmed.nfkc().collect();
    if token.is_empty() {
        return token;
    }
    match language {
        "en" => normalize_en(&token),
        "ru" => normalize_ru(&token),
        _ => token,
    }
}

fn normalize_en(token: &str) -> String {
    let mut token = token.to_string();
    if token.ends_with("'s") {
        token.truncate(token.len() - 2);
    } else if token.ends_with('\'') {
        token.truncate(token.len() - 1);
    }
    if token.ends_with("ies") && token.chars().count() > 4 {
        token.truncate(token.len() - 3);
        token.push('y');
    }
    if token.ends_with("sses") && token.chars().count() > 4 {
        token.truncate(token.len() - 2);
    }
    for suffix in EN_SUFFIXES {
        if let Some(stem) = strip_suffix_with_min_len(&token, suffix, 3) {
            token = stem;
            break;
        }
    }
    if token.chars().count() > 3 && token.ends_with("nn") {
        token.truncate(token.len() - 1);
    }
    token
}

fn normalize_ru(token: &str) -> String {
    let mut token = token.to_string();
    for suffix in RU_SUFFIXES {
        if let Some(stem) = strip_suffix_with_min_len(&token, suffix, 3) {
            token = stem;
            break;
        }
    }
    token.trim_end_matches(['ь', 'й']).to_string()
}

fn strip_suffix_with_min_len(token: &str, suffix: &str, min_len: usize) -> Option<String> {
    if !token.ends_with(suffix) {
        return None;
    }
    let stem_len = token.chars().count() - suffix.chars().count();
    if stem_len < min_len {
        return None;
    }
    Some(token[..token.len() - suffix.len()].to_string())
}

/// Score every keyword extracted from `items`' titles and summaries with
/// exponential age decay, returning trends in descending score order.
pub fn score_trends(
    items: &[SourceItem],
    now: NaiveDateTime,
    decay_hours: f64,
    title_weight: f64,
    summary_weight: f64,
) -> Vec<Trend> {
    let mut weight_by_keyword: HashMap<String, f64> = HashMap::new();
    let mut items_by_keyword: HashMap<String, Vec<SourceItem>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let decay_seconds = decay_hours.max(0.0) * 3600.0;

    for item in items {
        let language = item.language.clone().unwrap_or_else(|| {
            detect_language(&format!("{} {}", item.title, item.summary.as_deref().unwrap_or(""))).to_string()
        });
        let title_keywords = extract_keywords(&item.title, Some(&language));
        let summary_keywords = extract_keywords(item.summary.as_deref().unwrap_or(""), Some(&language));
        if title_keywords.is_empty() && summary_keywords.is_empty() {
            continue;
        }

        let age = (now - item.published).num_milliseconds() as f64 / 1000.0;
        let age = age.max(0.0);
        let base_weight = if decay_seconds > 0.0 {
            (-age / decay_seconds).exp()
        } else {
            1.0
        };

        for keyword in &title_keywords {
            accumulate(&mut weight_by_keyword, &mut items_by_keyword, &mut order, keyword, base_weight * title_weight.max(0.0), item);
        }
        for keyword in &summary_keywords {
            accumulate(&mut weight_by_keyword, &mut items_by_keyword, &mut order, keyword, base_weight * summary_weight.max(0.0), item);
        }
    }

    let mut trends: Vec<Trend> = order
        .into_iter()
        .map(|keyword| {
            let score = (weight_by_keyword[&keyword] * 1000.0).round() / 1000.0;
            let items = items_by_keyword.remove(&keyword).unwrap_or_default();
            Trend { keyword, score, items }
        })
        .collect();

    trends.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    trends
}

fn accumulate(
    weight_by_keyword: &mut HashMap<String, f64>,
    items_by_keyword: &mut HashMap<String, Vec<SourceItem>>,
    order: &mut Vec<String>,
    keyword: &str,
    weight: f64,
    item: &SourceItem,
) {
    if !weight_by_keyword.contains_key(keyword) {
        order.push(keyword.to_string());
    }
    *weight_by_keyword.entry(keyword.to_string()).or_insert(0.0) += weight;
    let entries = items_by_keyword.entry(keyword.to_string()).or_default();
    if !entries.iter().any(|existing| existing.id == item.id && existing.fingerprint() == item.fingerprint()) {
        entries.push(item.clone());
    }
}

pub fn now_naive() -> NaiveDateTime {
    Utc::now().naive_utc()
}
