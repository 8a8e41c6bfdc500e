//! CLI-primary configuration. There is no TOML app-config file: every
//! tunable here has a flag and a documented default. The one file-based
//! input is the additional-sources JSON array, loaded with `serde_json`
//! into the same `SourceConfig` type used everywhere else.

use std::path::Path;

use url::Url;

use crate::errors::{AppError, SourceError};
use crate::model::SourceConfig;

/// Load the `--sources PATH` JSON file, if given, as additional source
/// configs. Returns an empty vec when `path` is `None`. A malformed top-level
/// document (not even a JSON array) is a fatal config error; a single
/// misconfigured entry inside that array (unknown `kind`, malformed `url`,
/// missing required field) is a permanent source misconfiguration per the
/// error taxonomy -- it is logged and that one entry is skipped rather than
/// aborting the whole process.
pub fn load_additional_sources(path: Option<&Path>) -> Result<Vec<SourceConfig>, AppError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|err| AppError::config(format!("failed to read {}: {err}", path.display())))?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&raw)
        .map_err(|err| AppError::config(format!("failed to parse {}: {err}", path.display())))?;

    let mut sources = Vec::with_capacity(entries.len());
    for entry in entries {
        match parse_source_entry(entry) {
            Ok(config) => sources.push(config),
            Err(reason) => tracing::warn!(reason = %reason, "skipping misconfigured source"),
        }
    }
    Ok(sources)
}

/// Validate and deserialize one `--sources` entry. An unknown `kind` or a
/// `url` that fails to parse is a permanent misconfiguration: the caller logs
/// the reason and skips just this entry.
fn parse_source_entry(value: serde_json::Value) -> Result<SourceConfig, String> {
    let name = value
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("<unnamed>")
        .to_string();

    if let Some(kind) = value.get("kind").and_then(|v| v.as_str()) {
        if !matches!(kind.to_ascii_lowercase().as_str(), "rss" | "video") {
            let err = SourceError::UnsupportedKind {
                name,
                kind: kind.to_string(),
            };
            return Err(err.to_string());
        }
    }

    let config: SourceConfig = serde_json::from_value(value)
        .map_err(|err| format!("{name}: failed to deserialize source config: {err}"))?;

    if let Err(err) = Url::parse(&config.url) {
        return Err(format!("{}: malformed url {:?}: {err}", config.name, config.url));
    }

    Ok(config)
}

/// The built-in set of sources shipped with the binary: a small, well-known
/// mix of RSS feeds so `trend-monitor` produces output with zero
/// configuration. `--sources PATH` adds to this list rather than replacing it.
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("Google Trends (US)", "https://trends.google.com/trends/trendingsearches/daily/rss?geo=US"),
        SourceConfig::new("Hacker News", "https://hnrss.org/frontpage"),
        SourceConfig::new("Lenta.ru", "https://lenta.ru/rss").with_language("ru"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_yields_empty_sources() {
        assert!(load_additional_sources(None).unwrap().is_empty());
    }

    #[test]
    fn default_sources_are_non_empty_and_distinct() {
        let sources = default_sources();
        assert!(!sources.is_empty());
        let names: std::collections::HashSet<_> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), sources.len());
    }

    #[test]
    fn parses_additional_sources_json() {
        let mut file = tempfile_path();
        write!(file.1, r#"[{{"name":"hn","url":"https://news.example.com/rss"}}]"#).unwrap();
        let sources = load_additional_sources(Some(&file.0)).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "hn");
    }

    #[test]
    fn unknown_kind_is_skipped_not_fatal() {
        let mut file = tempfile_path();
        write!(
            file.1,
            r#"[{{"name":"bad","url":"https://example.com/rss","kind":"podcast"}},
                {{"name":"hn","url":"https://news.example.com/rss"}}]"#
        )
        .unwrap();
        let sources = load_additional_sources(Some(&file.0)).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "hn");
    }

    #[test]
    fn malformed_url_is_skipped_not_fatal() {
        let mut file = tempfile_path();
        write!(
            file.1,
            r#"[{{"name":"bad","url":"not a url"}},
                {{"name":"hn","url":"https://news.example.com/rss"}}]"#
        )
        .unwrap();
        let sources = load_additional_sources(Some(&file.0)).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "hn");
    }

    fn tempfile_path() -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!(
            "trend_monitor_sources_{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }
}
