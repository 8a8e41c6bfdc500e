use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha1::{Digest, Sha1};

use crate::errors::SourceError;
use crate::http_client::HttpTransport;
use crate::model::{FetchResult, SourceConfig, SourceItem};
use crate::video::{parse_video_metadata, VideoMetadata};

use super::Source;

pub struct VideoPageSource {
    config: SourceConfig,
    http: Arc<dyn HttpTransport>,
}

impl VideoPageSource {
    pub fn new(config: SourceConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl Source for VideoPageSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn fetch(&mut self) -> Result<FetchResult, SourceError> {
        let timeout = Duration::from_secs_f64(self.config.timeout.max(0.0));
        let response = self
            .http
            .get(&self.config.url, &HashMap::new(), timeout)
            .await?;
        let body = response.text_lossy();

        let metadata = parse_video_metadata(&body)
            .ok_or_else(|| SourceError::missing_metadata(&self.config.url))?;

        let item = project_item(&self.config, &metadata);
        Ok(FetchResult {
            items: vec![item],
            not_modified: false,
            headers: Some(response.headers.clone()),
        })
    }
}

fn project_item(config: &SourceConfig, metadata: &VideoMetadata) -> SourceItem {
    let now = chrono::Utc::now().naive_utc();
    let published = if config.use_upload_date_as_published() {
        metadata.upload_date.unwrap_or(now)
    } else {
        now
    };

    let title = if metadata.title.is_empty() {
        config.name.clone()
    } else {
        metadata.title.clone()
    };
    let url = metadata
        .url
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| config.url.clone());
    let language = metadata.language.clone().or_else(|| config.language.clone());

    let summary = Some(build_summary(config, metadata));
    let id = synthesize_video_id(&url, metadata);

    SourceItem {
        id,
        title,
        url,
        published,
        summary,
        language,
    }
}

fn build_summary(config: &SourceConfig, metadata: &VideoMetadata) -> String {
    let mut parts = Vec::new();
    if let Some(author) = &metadata.author_name {
        parts.push(author.clone());
    }

    let mut metrics = Vec::new();
    if let Some(views) = metadata.view_count {
        metrics.push(format!("просмотры: {views}"));
    }
    if let Some(likes) = metadata.like_count {
        metrics.push(format!("лайки: {likes}"));
    }
    if let Some(comments) = metadata.comment_count {
        metrics.push(format!("комментарии: {comments}"));
    }
    if !metrics.is_empty() {
        parts.push(metrics.join(", "));
    }

    if let Some(upload_date) = metadata.upload_date {
        parts.push(upload_date.format("%Y-%m-%d %H:%M").to_string());
    }

    if !metadata.keywords.is_empty() {
        let keywords: Vec<&str> = metadata.keywords.iter().take(5).map(String::as_str).collect();
        parts.push(keywords.join(", "));
    }

    if let Some(description) = &metadata.description {
        let limit = config.summary_description_limit();
        parts.push(truncate_with_ellipsis(description, limit));
    }

    parts.join(" | ")
}

fn truncate_with_ellipsis(text: &str, limit: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= limit {
        return text.to_string();
    }
    let truncated: String = text.chars().take(limit).collect();
    format!("{truncated}...")
}

fn synthesize_video_id(url: &str, metadata: &VideoMetadata) -> String {
    let upload_iso = metadata
        .upload_date
        .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default();
    let canonical = format!(
        "{}|{}|{}|{}|{}",
        url,
        upload_iso,
        metadata.view_count.unwrap_or_default(),
        metadata.like_count.unwrap_or_default(),
        metadata.comment_count.unwrap_or_default(),
    );
    let mut hasher = Sha1::new();
    hasher.update(canonical.as_bytes());
    format!("video:sha1({:x})", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::fake::FakeTransport;
    use crate::http_client::HttpResponse;

    #[tokio::test]
    async fn extracts_activity_summary_with_russian_labels() {
        let html = br#"
        <html><head>
        <script type="application/ld+json">
        {
          "@context": "https://schema.org",
          "@type": "VideoObject",
          "name": "Video headline",
          "uploadDate": "2024-07-01T10:00:00Z",
          "url": "https://example.com/watch?v=99",
          "author": {"@type": "Person", "name": "Creator"},
          "interactionStatistic": [
            {"@type": "InteractionCounter", "interactionType": {"@type": "WatchAction"}, "userInteractionCount": 2048},
            {"@type": "InteractionCounter", "interactionType": {"@type": "LikeAction"}, "userInteractionCount": 256}
          ]
        }
        </script>
        </head></html>"#;

        let transport = Arc::new(FakeTransport::new(vec![HttpResponse {
            status: 200,
            headers: [("Content-Type".to_string(), "text/html; charset=utf-8".to_string())]
                .into_iter()
                .collect(),
            body: html.to_vec(),
        }]));

        let mut config = SourceConfig::new("video", "https://example.com/watch?v=99");
        config.kind = crate::model::SourceKind::Video;
        let mut source = VideoPageSource::new(config, transport);

        let result = source.fetch().await.unwrap();
        assert_eq!(result.items.len(), 1);
        let item = &result.items[0];
        assert_eq!(item.title, "Video headline");
        assert_eq!(item.url, "https://example.com/watch?v=99");
        assert!(item.summary.as_ref().unwrap().contains("просмотры"));
        assert!(item.id.starts_with("video:"));
    }

    #[tokio::test]
    async fn respects_upload_date_as_published_flag() {
        let html = br#"
        <html><head>
        <script type='application/ld+json'>
        {
          "@context": "https://schema.org",
          "@type": "VideoObject",
          "name": "Recorded stream",
          "uploadDate": "2024-07-10T09:30:00Z",
          "url": "https://example.com/watch?v=100"
        }
        </script>
        </head></html>"#;

        let transport = Arc::new(FakeTransport::new(vec![HttpResponse {
            status: 200,
            headers: [("Content-Type".to_string(), "text/html".to_string())]
                .into_iter()
                .collect(),
            body: html.to_vec(),
        }]));

        let mut config = SourceConfig::new("video", "https://example.com/watch?v=100");
        config.kind = crate::model::SourceKind::Video;
        config
            .extra
            .insert("use_upload_date_as_published".to_string(), serde_json::json!(true));
        let mut source = VideoPageSource::new(config, transport);

        let result = source.fetch().await.unwrap();
        let item = &result.items[0];
        assert_eq!(item.published.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-07-10 09:30:00");
    }
}
