pub mod postgres;

pub use postgres::PgStore;

use crate::traits::ArticleStore;
use crate::types::{DailyDigest, EnrichedArticle, PipelineError, Result, StoredArticle};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Tables {
    articles: Vec<StoredArticle>,
    by_url: HashMap<String, usize>,
    digests: HashMap<NaiveDate, DailyDigest>,
}

/// In-process store for tests, dry runs and `--memory`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored articles in insertion order.
    pub async fn articles(&self) -> Vec<StoredArticle> {
        self.tables.read().await.articles.clone()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn exists_by_url(&self, url: &str) -> Result<bool> {
        Ok(self.tables.read().await.by_url.contains_key(url))
    }

    async fn insert_article(&self, article: &EnrichedArticle) -> Result<StoredArticle> {
        let mut tables = self.tables.write().await;
        let url = &article.raw.original_url;
        if tables.by_url.contains_key(url) {
            return Err(PipelineError::PersistenceConflict { url: url.clone() });
        }

        let now = Utc::now();
        let stored = StoredArticle {
            id: tables.articles.len() as i64 + 1,
            article: article.clone(),
            is_archived: false,
            created_at: now,
            updated_at: now,
        };
        let index = tables.articles.len();
        tables.by_url.insert(url.clone(), index);
        tables.articles.push(stored.clone());
        debug!("Stored article {} as #{}", url, stored.id);
        Ok(stored)
    }

    async fn insert_digest_if_absent(&self, digest: &DailyDigest) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.digests.contains_key(&digest.date) {
            return Ok(false);
        }
        tables.digests.insert(digest.date, digest.clone());
        Ok(true)
    }

    async fn digest_for(&self, date: NaiveDate) -> Result<Option<DailyDigest>> {
        Ok(self.tables.read().await.digests.get(&date).cloned())
    }

    async fn count_articles(&self) -> Result<usize> {
        Ok(self.tables.read().await.articles.len())
    }
}
