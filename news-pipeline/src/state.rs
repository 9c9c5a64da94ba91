use crate::traits::ArticleStore;
use crate::types::{EnrichedArticle, PipelineError, StoredArticle};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of one persistence pass.
#[derive(Debug, Default)]
pub struct PersistReport {
    pub stored: Vec<StoredArticle>,
    pub skipped_duplicates: usize,
    pub failed: usize,
}

/// Dedup gateway in front of the store. The existence check saves a write;
/// the store's unique constraint decides races.
pub struct PersistenceGateway {
    store: Arc<dyn ArticleStore>,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn ArticleStore> {
        self.store.clone()
    }

    pub async fn persist(&self, articles: &[EnrichedArticle]) -> PersistReport {
        let mut report = PersistReport::default();

        for article in articles {
            let url = &article.raw.original_url;

            match self.store.exists_by_url(url).await {
                Ok(true) => {
                    debug!("Skipping stored article {}", url);
                    report.skipped_duplicates += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Existence check failed for {}: {}", url, e);
                    report.failed += 1;
                    continue;
                }
            }

            match self.store.insert_article(article).await {
                Ok(stored) => report.stored.push(stored),
                Err(PipelineError::PersistenceConflict { .. }) => {
                    debug!("Concurrent insert already stored {}", url);
                    report.skipped_duplicates += 1;
                }
                Err(e) => {
                    error!("Failed to save {}: {}", url, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            saved = report.stored.len(),
            skipped = report.skipped_duplicates,
            failed = report.failed,
            "Persistence pass finished"
        );
        report
    }
}
