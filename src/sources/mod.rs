//! Source adapters: tagged-variant dispatch on [`SourceKind`], one concrete
//! implementation per kind, no runtime reflection.

mod rss;
mod video_page;

pub use rss::RSSSource;
pub use video_page::VideoPageSource;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::SourceError;
use crate::http_client::HttpTransport;
use crate::model::{FetchResult, SourceConfig, SourceKind};

#[async_trait]
pub trait Source: Send {
    fn name(&self) -> &str;
    fn config(&self) -> &SourceConfig;
    async fn fetch(&mut self) -> Result<FetchResult, SourceError>;
}

/// Build the adapter matching `config.kind`. There is no "unknown kind"
/// error path left at this level because `SourceKind` is an exhaustive enum;
/// an unrecognised `kind` string in the additional-sources JSON is caught and
/// logged by `config::load_additional_sources` before a `SourceConfig` (and
/// thus a `SourceError::UnsupportedKind`) is ever produced for it.
pub fn build_source(config: SourceConfig, http: Arc<dyn HttpTransport>) -> Box<dyn Source> {
    match config.kind {
        SourceKind::Rss => Box::new(RSSSource::new(config, http)),
        SourceKind::Video => Box::new(VideoPageSource::new(config, http)),
    }
}
