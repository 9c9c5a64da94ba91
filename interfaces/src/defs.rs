use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Web,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub language: Language,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
}

impl Source {
    pub fn rss(name: &str, url: &str, language: Language, category: &str) -> Self {
        Self {
            name: name.to_owned(),
            url: url.to_owned(),
            language,
            category: category.to_owned(),
            kind: SourceKind::Rss,
        }
    }
}

/// One normalized feed entry. `original_url` is the identity key across runs,
/// but may repeat inside a single fetch batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    pub title: String,
    pub original_url: String,
    pub source_name: String,
    pub language: Language,
    pub published_at: DateTime<Utc>,
    pub raw_content: String,
    pub category: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedArticle {
    #[serde(flatten)]
    pub raw: RawArticle,
    pub summary: String,
    pub reading_time_minutes: u32,
    pub tags: Vec<String>,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArticle {
    pub id: i64,
    #[serde(flatten)]
    pub article: EnrichedArticle,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyDigest {
    pub date: NaiveDate,
    pub overall_summary: String,
    pub top_categories: Vec<String>,
    pub total_articles: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Daily,
    Hourly,
    Manual,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Daily => "daily",
            RunKind::Hourly => "hourly",
            RunKind::Manual => "manual",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub id: Uuid,
    pub kind: RunKind,
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
}

impl RunState {
    pub fn begin(kind: RunKind, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            started_at,
            status: RunStatus::Running,
        }
    }

    pub fn finish(mut self, status: RunStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub crawled: usize,
    pub enriched: usize,
    pub saved: usize,
    pub skipped_duplicates: usize,
    pub failed: usize,
    pub digest_preview: String,
}

/// Milestones of a manual run, in emission order. A stream always ends with
/// exactly one `Complete` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ProgressEvent {
    Crawling,
    Crawled { count: usize },
    AiProcessing,
    AiCompleted { count: usize },
    Saving,
    Digest,
    Complete { summary: RunSummary },
    Error { message: String },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }

    pub fn step(&self) -> &'static str {
        match self {
            ProgressEvent::Crawling => "crawling",
            ProgressEvent::Crawled { .. } => "crawled",
            ProgressEvent::AiProcessing => "ai_processing",
            ProgressEvent::AiCompleted { .. } => "ai_completed",
            ProgressEvent::Saving => "saving",
            ProgressEvent::Digest => "digest",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }
}
