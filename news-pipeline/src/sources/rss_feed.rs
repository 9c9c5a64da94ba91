use crate::clock::{Clock, SystemClock};
use crate::traits::FeedSource;
use crate::types::{FetcherConfig, PipelineError, RawArticle, Result, Source, SourceKind};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// RSS/Atom source over HTTP
pub struct RssFeedSource {
    fetcher: Arc<Fetcher>,
    clock: Arc<dyn Clock>,
}

impl RssFeedSource {
    pub fn new(fetch_config: FetcherConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Arc::new(Fetcher::new(fetch_config)?),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    fn source_name(&self) -> String {
        "RSS over HTTP".to_string()
    }

    async fn fetch_entries(&self, source: &Source) -> Result<Vec<RawArticle>> {
        if source.kind != SourceKind::Rss {
            warn!("Skipping {}: {:?} sources are not fetched as feeds", source.name, source.kind);
            return Ok(Vec::new());
        }

        info!("Pulling RSS feed: {} ({})", source.name, source.url);

        let content = self.fetcher.fetch_feed(&source.url).await?;

        if !FeedParser::is_valid_feed_content(&content) {
            return Err(PipelineError::Parse(format!(
                "{} did not return an RSS or Atom document",
                source.url
            )));
        }

        FeedParser::parse_articles(source, &content, self.clock.now())
    }
}
