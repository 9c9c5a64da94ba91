#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use news_pipeline::{
    ArticleStore, Clock, DailyDigest, EnrichedArticle, FeedSource, Language, LlmAdapter,
    MemoryStore, MockLlmAdapter, PacingConfig, PipelineError, RawArticle, Result,
    RunOrchestrator, ScheduleConfig, Source, SourceRegistry, StoredArticle,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();
}

pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub fn source(name: &str) -> Source {
    Source::rss(name, &format!("https://{}.example/rss", name), Language::En, "general")
}

pub fn raw(source: &str, n: usize, published_at: DateTime<Utc>) -> RawArticle {
    RawArticle {
        title: format!("{} story {}", source, n),
        original_url: format!("https://{}.example/articles/{}", source, n),
        source_name: source.to_string(),
        language: Language::En,
        published_at,
        raw_content: format!("Report number {} from {}. Details follow.", n, source),
        category: "general".to_string(),
        description: None,
    }
}

/// Clock frozen at one instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Feed that serves canned articles per source name. Unknown sources fail.
pub struct StaticFeed {
    articles: HashMap<String, Vec<RawArticle>>,
    calls: AtomicUsize,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self {
            articles: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn serve(mut self, source: &str, articles: Vec<RawArticle>) -> Self {
        self.articles.insert(source.to_string(), articles);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    fn source_name(&self) -> String {
        "static".to_string()
    }

    async fn fetch_entries(&self, source: &Source) -> Result<Vec<RawArticle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.articles
            .get(&source.name)
            .cloned()
            .ok_or_else(|| PipelineError::SourceFetch {
                name: source.name.clone(),
                message: "connection refused".to_string(),
            })
    }
}

/// Feed whose fetches wait until the gate is opened.
pub struct GatedFeed {
    inner: StaticFeed,
    gate: Arc<Notify>,
}

impl GatedFeed {
    pub fn new(inner: StaticFeed) -> Self {
        Self {
            inner,
            gate: Arc::new(Notify::new()),
        }
    }

    pub fn gate(&self) -> Arc<Notify> {
        self.gate.clone()
    }

    pub fn calls(&self) -> usize {
        self.inner.calls()
    }
}

#[async_trait]
impl FeedSource for GatedFeed {
    fn source_name(&self) -> String {
        "gated".to_string()
    }

    async fn fetch_entries(&self, source: &Source) -> Result<Vec<RawArticle>> {
        let result = self.inner.fetch_entries(source).await;
        self.gate.notified().await;
        result
    }
}

/// Store whose existence check always misses, as if another run inserted
/// the same URL between check and insert.
pub struct RacingStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl ArticleStore for RacingStore {
    async fn exists_by_url(&self, _url: &str) -> Result<bool> {
        Ok(false)
    }

    async fn insert_article(&self, article: &EnrichedArticle) -> Result<StoredArticle> {
        self.inner.insert_article(article).await
    }

    async fn insert_digest_if_absent(&self, digest: &DailyDigest) -> Result<bool> {
        self.inner.insert_digest_if_absent(digest).await
    }

    async fn digest_for(&self, date: NaiveDate) -> Result<Option<DailyDigest>> {
        self.inner.digest_for(date).await
    }

    async fn count_articles(&self) -> Result<usize> {
        self.inner.count_articles().await
    }
}

pub fn no_pacing() -> PacingConfig {
    PacingConfig {
        delay: std::time::Duration::ZERO,
        max_batch_size: None,
    }
}

pub fn orchestrator(
    sources: Vec<Source>,
    feed: Arc<dyn FeedSource>,
    adapter: Arc<dyn LlmAdapter>,
    store: Arc<dyn ArticleStore>,
    clock: Arc<dyn Clock>,
) -> RunOrchestrator {
    RunOrchestrator::builder()
        .registry(SourceRegistry::new(sources).unwrap())
        .feed_source(feed)
        .adapter(adapter)
        .pacing(no_pacing())
        .store(store)
        .clock(clock)
        .schedule(ScheduleConfig::default())
        .build()
        .unwrap()
}

pub fn mock_adapter() -> Arc<MockLlmAdapter> {
    Arc::new(MockLlmAdapter::new("test"))
}

pub fn hours(n: i64) -> Duration {
    Duration::hours(n)
}
