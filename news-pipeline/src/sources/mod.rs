pub mod rss_feed;

pub use rss_feed::RssFeedSource;

use crate::rss_utils::url::is_valid_feed_url;
use crate::types::{Language, PipelineError, Result, Source, SourceKind};
use std::path::Path;
use tracing::info;

/// Read-only list of configured feeds, in the order runs visit them.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>) -> Result<Self> {
        if sources.is_empty() {
            return Err(PipelineError::Config("source list is empty".to_string()));
        }
        if let Some(bad) = sources.iter().find(|s| !is_valid_feed_url(&s.url)) {
            return Err(PipelineError::Config(format!(
                "source {} has an invalid URL: {}",
                bad.name, bad.url
            )));
        }
        Ok(Self { sources })
    }

    /// Load a JSON array of sources, e.g. `[{"name": .., "url": .., "language": "en", "category": .., "type": "rss"}]`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let sources: Vec<Source> = serde_json::from_str(&raw)?;
        info!("Loaded {} sources from {}", sources.len(), path.display());
        Self::new(sources)
    }

    pub fn all(&self) -> &[Source] {
        &self.sources
    }

    /// The first `n` sources, or all of them when fewer are configured.
    pub fn prefix(&self, n: usize) -> &[Source] {
        &self.sources[..n.min(self.sources.len())]
    }

    pub fn rss_only(&self) -> Vec<Source> {
        self.sources
            .iter()
            .filter(|s| s.kind == SourceKind::Rss)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self {
            sources: vec![
                Source::rss("BBC News", "https://feeds.bbci.co.uk/news/rss.xml", Language::En, "general"),
                Source::rss("Reuters", "https://www.reuters.com/rssFeed/topNews", Language::En, "general"),
                Source::rss("TechCrunch", "https://techcrunch.com/feed/", Language::En, "tech"),
                Source::rss("The Guardian", "https://www.theguardian.com/world/rss", Language::En, "world"),
                Source::rss("新华网", "http://www.xinhuanet.com/politics/news_politics.xml", Language::Zh, "politics"),
                Source::rss("澎湃新闻", "https://www.thepaper.cn/rss/news.xml", Language::Zh, "general"),
                Source::rss("36氪", "https://36kr.com/feed", Language::Zh, "tech"),
                Source::rss("财新网", "http://www.caixin.com/rss/news.xml", Language::Zh, "finance"),
            ],
        }
    }
}
