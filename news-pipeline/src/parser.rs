use crate::rss_utils::html::clean_content;
use crate::types::{PipelineError, RawArticle, Result, Source};
use chrono::{DateTime, Utc};
use feed_rs::parser;
use std::collections::HashSet;
use tracing::{debug, info};

/// Turns RSS/Atom documents into normalized articles tagged with their source.
pub struct FeedParser;

impl FeedParser {
    pub fn parse_articles(source: &Source, content: &str, now: DateTime<Utc>) -> Result<Vec<RawArticle>> {
        debug!("Parsing feed content for {} ({} bytes)", source.name, content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| PipelineError::Parse(format!("Failed to parse feed: {}", e)))?;

        let mut seen_urls = HashSet::new();
        let mut articles = Vec::new();

        for entry in feed.entries {
            if let Some(article) = Self::parse_entry(source, entry, now) {
                if !seen_urls.insert(article.original_url.clone()) {
                    debug!("Skipping repeated entry in document: {}", article.original_url);
                    continue;
                }
                articles.push(article);
            }
        }

        info!("Parsed {} entries from {}", articles.len(), source.name);
        Ok(articles)
    }

    fn parse_entry(source: &Source, entry: feed_rs::model::Entry, now: DateTime<Utc>) -> Option<RawArticle> {
        // Without a link there is nothing to deduplicate on
        let original_url = match entry.links.first() {
            Some(link) if !link.href.trim().is_empty() => link.href.trim().to_string(),
            _ => {
                debug!("Dropping entry without link from {}", source.name);
                return None;
            }
        };

        let title = entry
            .title
            .map(|t| clean_content(&t.content))
            .unwrap_or_default();

        let description = entry
            .summary
            .map(|s| clean_content(&s.content))
            .filter(|s| !s.is_empty());

        let body = entry
            .content
            .and_then(|c| c.body)
            .map(|b| clean_content(&b))
            .filter(|b| !b.is_empty());

        let raw_content = description.clone().or(body).unwrap_or_default();
        let published_at = entry.published.or(entry.updated).unwrap_or(now);

        Some(RawArticle {
            title,
            original_url,
            source_name: source.name.clone(),
            language: source.language,
            published_at,
            raw_content,
            category: source.category.clone(),
            description,
        })
    }

    pub fn is_valid_feed_content(content: &str) -> bool {
        let content_lower = content.to_lowercase();
        content_lower.contains("<rss")
            || content_lower.contains("<feed")
            || content_lower.contains("<channel")
            || content_lower.contains("<rdf:rdf")
    }
}
