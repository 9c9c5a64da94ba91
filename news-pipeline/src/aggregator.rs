use crate::traits::FeedSource;
use crate::types::{RawArticle, Source};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info};

/// Feed fetcher stage: pulls every source and concatenates their articles in
/// source order. A failing source is logged and contributes nothing.
pub struct FeedAggregator {
    feed_source: Arc<dyn FeedSource>,
    concurrency: usize,
}

impl FeedAggregator {
    pub fn new(feed_source: Arc<dyn FeedSource>) -> Self {
        Self {
            feed_source,
            concurrency: 1,
        }
    }

    /// Fetch up to `concurrency` sources at once. Output order is unchanged.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn fetch_all(&self, sources: &[Source]) -> Vec<RawArticle> {
        let total_sources = sources.len();

        let feed_source = self.feed_source.clone();
        let results: Vec<_> = stream::iter(sources.iter().cloned())
            .map(move |source| {
                let feed_source = feed_source.clone();
                async move {
                    let result = feed_source.fetch_entries(&source).await;
                    (source, result)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut articles = Vec::new();
        let mut successful = 0;

        for (source, result) in results {
            match result {
                Ok(items) => {
                    info!("✓ {}: {} articles", source.name, items.len());
                    successful += 1;
                    articles.extend(items);
                }
                Err(e) => {
                    error!("✗ Failed to crawl {}: {}", source.name, e);
                }
            }
        }

        info!(
            "Fetched {}/{} sources via {}, {} articles",
            successful,
            total_sources,
            self.feed_source.source_name(),
            articles.len()
        );
        articles
    }
}
