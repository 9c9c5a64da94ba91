use crate::digest::DigestStats;
use crate::llm_adapter::LlmAdapter;
use crate::types::{EnrichedArticle, PacingConfig, RawArticle, Sentiment};
use crate::utils::{detect_sentiment, extract_tags, reading_time_minutes, truncate_with_ellipsis};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PLAIN_SUMMARY_CHARS: usize = 150;

/// Enrichment stage: summary from the external service plus local tags,
/// sentiment and reading time. Calls to the service are strictly sequential.
pub struct EnrichmentEngine {
    adapter: Arc<dyn LlmAdapter>,
    pacing: PacingConfig,
}

impl EnrichmentEngine {
    pub fn new(adapter: Arc<dyn LlmAdapter>, pacing: PacingConfig) -> Self {
        Self { adapter, pacing }
    }

    pub fn adapter_name(&self) -> String {
        self.adapter.adapter_name()
    }

    /// How many of `count` articles one `enrich` call will attempt.
    pub fn batch_len(&self, count: usize) -> usize {
        self.pacing.max_batch_size.map_or(count, |max| count.min(max))
    }

    /// Enrich in input order. Articles whose summary fails are dropped.
    pub async fn enrich(&self, articles: &[RawArticle]) -> Vec<EnrichedArticle> {
        let batch = match self.pacing.max_batch_size {
            Some(max) if articles.len() > max => {
                warn!(
                    "Enriching {} of {} articles, the rest exceed the batch limit",
                    max,
                    articles.len()
                );
                &articles[..max]
            }
            _ => articles,
        };

        info!("Enriching {} articles via {}", batch.len(), self.adapter.adapter_name());

        let mut enriched = Vec::with_capacity(batch.len());
        for (i, article) in batch.iter().enumerate() {
            if i > 0 && !self.pacing.delay.is_zero() {
                tokio::time::sleep(self.pacing.delay).await;
            }

            match self.adapter.summarize_article(article).await {
                Ok(summary) if !summary.trim().is_empty() => {
                    debug!("Enriched {}", article.original_url);
                    enriched.push(Self::annotate(article.clone(), summary));
                }
                Ok(_) => {
                    warn!("Dropping {}: empty summary", article.original_url);
                }
                Err(e) => {
                    warn!("Dropping {}: {}", article.original_url, e);
                }
            }
        }

        info!(
            "Enrichment finished: {} kept, {} dropped",
            enriched.len(),
            batch.len() - enriched.len()
        );
        enriched
    }

    /// Local-only enrichment: truncated content as the summary, no service calls.
    pub fn enrich_without_ai(articles: &[RawArticle]) -> Vec<EnrichedArticle> {
        articles
            .iter()
            .map(|article| EnrichedArticle {
                summary: truncate_with_ellipsis(&article.raw_content, PLAIN_SUMMARY_CHARS),
                reading_time_minutes: reading_time_minutes(&article.raw_content),
                tags: vec!["news".to_string()],
                sentiment: Sentiment::Neutral,
                raw: article.clone(),
            })
            .collect()
    }

    /// Narrative for a run. Falls back to a locally rendered text when the
    /// service cannot write one. Paced like the summary calls before it.
    pub async fn digest(&self, enriched: &[EnrichedArticle]) -> String {
        let stats = DigestStats::from_articles(enriched);
        if !self.pacing.delay.is_zero() {
            tokio::time::sleep(self.pacing.delay).await;
        }
        match self.adapter.narrate_digest(&stats).await {
            Ok(narrative) if !narrative.trim().is_empty() => narrative,
            Ok(_) => {
                warn!("Empty digest narrative, using fallback");
                stats.render_fallback()
            }
            Err(e) => {
                warn!("Digest narrative failed, using fallback: {}", e);
                stats.render_fallback()
            }
        }
    }

    fn annotate(article: RawArticle, summary: String) -> EnrichedArticle {
        let tags = extract_tags(&article.raw_content);
        let sentiment = detect_sentiment(&article.raw_content);
        let reading_time_minutes = reading_time_minutes(&article.raw_content);
        EnrichedArticle {
            raw: article,
            summary,
            reading_time_minutes,
            tags,
            sentiment,
        }
    }
}
