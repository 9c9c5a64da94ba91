use crate::traits::ArticleStore;
use crate::types::{DailyDigest, EnrichedArticle, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

const TOP_TITLES: usize = 5;

/// Aggregate numbers a run-level narrative is written from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestStats {
    pub total_articles: usize,
    /// Category counts in first-seen order.
    pub category_counts: Vec<(String, usize)>,
    /// Most recently published titles, newest first.
    pub top_titles: Vec<String>,
}

impl DigestStats {
    pub fn from_articles(articles: &[EnrichedArticle]) -> Self {
        let mut category_counts: Vec<(String, usize)> = Vec::new();
        for article in articles {
            match category_counts.iter_mut().find(|(c, _)| *c == article.raw.category) {
                Some((_, count)) => *count += 1,
                None => category_counts.push((article.raw.category.clone(), 1)),
            }
        }

        let mut by_recency: Vec<&EnrichedArticle> = articles.iter().collect();
        by_recency.sort_by(|a, b| b.raw.published_at.cmp(&a.raw.published_at));
        let top_titles = by_recency
            .into_iter()
            .take(TOP_TITLES)
            .map(|a| a.raw.title.clone())
            .collect();

        Self {
            total_articles: articles.len(),
            category_counts,
            top_titles,
        }
    }

    /// `general: 3, tech: 2`
    pub fn category_line(&self) -> String {
        self.category_counts
            .iter()
            .map(|(category, count)| format!("{}: {}", category, count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Plain narrative used when the enrichment service cannot write one.
    pub fn render_fallback(&self) -> String {
        if self.total_articles == 0 {
            return "No articles were collected today.".to_string();
        }

        let mut text = format!(
            "{} articles collected today ({}).",
            self.total_articles,
            self.category_line()
        );
        if !self.top_titles.is_empty() {
            text.push_str(" Top stories: ");
            text.push_str(&self.top_titles.join("; "));
            text.push('.');
        }
        text
    }
}

/// Writes at most one digest per calendar day; the first write of a day wins.
pub struct DigestAggregator {
    store: Arc<dyn ArticleStore>,
}

impl DigestAggregator {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// Unique categories in first-seen order.
    pub fn top_categories(articles: &[EnrichedArticle]) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for article in articles {
            if !categories.contains(&article.raw.category) {
                categories.push(article.raw.category.clone());
            }
        }
        categories
    }

    /// Returns `true` if a new digest row was written for `date`.
    pub async fn upsert_digest(
        &self,
        date: NaiveDate,
        articles: &[EnrichedArticle],
        narrative: &str,
    ) -> Result<bool> {
        let digest = DailyDigest {
            date,
            overall_summary: narrative.to_string(),
            top_categories: Self::top_categories(articles),
            total_articles: articles.len(),
        };

        debug!("Writing digest for {} ({} articles)", date, digest.total_articles);
        let inserted = self.store.insert_digest_if_absent(&digest).await?;

        if inserted {
            info!("Saved daily digest for {}", date);
        } else {
            info!("Digest for {} already exists, keeping the first one", date);
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Language, RawArticle, Sentiment};
    use chrono::{Duration, TimeZone, Utc};

    fn article(title: &str, category: &str, hours_ago: i64) -> EnrichedArticle {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        EnrichedArticle {
            raw: RawArticle {
                title: title.to_string(),
                original_url: format!("https://example.com/{}", title),
                source_name: "Wire".to_string(),
                language: Language::En,
                published_at: base - Duration::hours(hours_ago),
                raw_content: String::new(),
                category: category.to_string(),
                description: None,
            },
            summary: "s".to_string(),
            reading_time_minutes: 1,
            tags: vec![],
            sentiment: Sentiment::Neutral,
        }
    }

    #[test]
    fn test_stats_counts_and_recency() {
        let articles: Vec<_> = (0..7)
            .map(|i| article(&format!("t{}", i), if i % 2 == 0 { "general" } else { "tech" }, i))
            .collect();
        let stats = DigestStats::from_articles(&articles);

        assert_eq!(stats.total_articles, 7);
        assert_eq!(
            stats.category_counts,
            vec![("general".to_string(), 4), ("tech".to_string(), 3)]
        );
        assert_eq!(stats.top_titles, vec!["t0", "t1", "t2", "t3", "t4"]);
        assert_eq!(stats.category_line(), "general: 4, tech: 3");
        assert!(stats.render_fallback().starts_with("7 articles collected today"));
    }

    #[tokio::test]
    async fn test_second_digest_same_day_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = DigestAggregator::new(store.clone());
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let first = vec![article("a", "general", 1), article("b", "tech", 2)];
        let second = vec![article("c", "finance", 1)];

        assert!(aggregator.upsert_digest(day, &first, "morning").await.unwrap());
        assert!(!aggregator.upsert_digest(day, &second, "evening").await.unwrap());

        let stored = store.digest_for(day).await.unwrap().unwrap();
        assert_eq!(stored.overall_summary, "morning");
        assert_eq!(stored.total_articles, 2);
        assert_eq!(stored.top_categories, vec!["general", "tech"]);
    }
}
