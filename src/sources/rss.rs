use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::SourceError;
use crate::feed::parse_feed;
use crate::http_client::HttpTransport;
use crate::model::{FetchResult, SourceConfig};

use super::Source;

/// RSS/Atom source. Caches `ETag`/`Last-Modified` between fetches so repeat
/// polls can use conditional GETs.
pub struct RSSSource {
    config: SourceConfig,
    http: Arc<dyn HttpTransport>,
    last_etag: Option<String>,
    last_modified: Option<String>,
}

impl RSSSource {
    pub fn new(config: SourceConfig, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            http,
            last_etag: None,
            last_modified: None,
        }
    }
}

#[async_trait]
impl Source for RSSSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn fetch(&mut self) -> Result<FetchResult, SourceError> {
        let mut headers = HashMap::new();
        if let Some(etag) = &self.last_etag {
            headers.insert("If-None-Match".to_string(), etag.clone());
        }
        if let Some(last_modified) = &self.last_modified {
            headers.insert("If-Modified-Since".to_string(), last_modified.clone());
        }

        let timeout = Duration::from_secs_f64(self.config.timeout.max(0.0));
        let response = self.http.get(&self.config.url, &headers, timeout).await?;

        if response.not_modified() {
            return Ok(FetchResult::not_modified());
        }

        if let Some(etag) = response.header("etag") {
            self.last_etag = Some(etag.to_string());
        }
        if let Some(last_modified) = response.header("last-modified") {
            self.last_modified = Some(last_modified.to_string());
        }

        let body = response.text_lossy();
        let mut items = parse_feed(&body, &self.config.url)?;
        for item in &mut items {
            if item.language.is_none() {
                item.language = self.config.language.clone();
            }
        }

        tracing::debug!(source = %self.config.name, count = items.len(), "fetched feed items");
        Ok(FetchResult {
            items,
            not_modified: false,
            headers: Some(response.headers.clone()),
        })
    }
}
