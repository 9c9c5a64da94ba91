use crate::types::{DailyDigest, EnrichedArticle, RawArticle, Result, Source, StoredArticle};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Pulls normalized articles for one configured source.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Human-readable name of the transport, for logs
    fn source_name(&self) -> String;

    /// Fetch and normalize every entry currently published by `source`.
    /// Any transport or parse problem is an error for this source only.
    async fn fetch_entries(&self, source: &Source) -> Result<Vec<RawArticle>>;
}

/// Persistence engine behind the dedup gateway.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn exists_by_url(&self, url: &str) -> Result<bool>;

    /// Insert a new article. A URL that is already stored yields
    /// `PipelineError::PersistenceConflict`.
    async fn insert_article(&self, article: &EnrichedArticle) -> Result<StoredArticle>;

    /// Returns `false` when a digest for that date already exists; the stored one is kept.
    async fn insert_digest_if_absent(&self, digest: &DailyDigest) -> Result<bool>;

    async fn digest_for(&self, date: NaiveDate) -> Result<Option<DailyDigest>>;

    async fn count_articles(&self) -> Result<usize>;
}
