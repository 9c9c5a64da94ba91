use std::time::Duration;

// Shared records live in the interfaces crate
pub use interfaces::defs::{
    DailyDigest, EnrichedArticle, Language, ProgressEvent, RawArticle, RunKind, RunState,
    RunStatus, RunSummary, Sentiment, Source, SourceKind, StoredArticle,
};

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
    pub per_host_interval_ms: u64,
    /// 1 fetches sources one at a time.
    pub concurrency: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "News-Pipeline/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 5,
            max_feed_size_mb: 10,
            max_redirects: 5,
            per_host_interval_ms: 1000,
            concurrency: 1,
        }
    }
}

/// Spacing between calls to the enrichment service.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    pub delay: Duration,
    pub max_batch_size: Option<usize>,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_batch_size: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub daily_hour: u32,
    pub daily_minute: u32,
    pub partial_interval: Duration,
    pub partial_source_count: usize,
    pub recency_window: chrono::Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_hour: 6,
            daily_minute: 0,
            partial_interval: Duration::from_secs(3 * 60 * 60),
            partial_source_count: 4,
            recency_window: chrono::Duration::hours(6),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl SummarizerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Source {name} failed: {message}")]
    SourceFetch { name: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Enrichment failed: {0}")]
    Enrichment(String),

    #[error("Article already stored: {url}")]
    PersistenceConflict { url: String },

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A {0} run is already in progress")]
    RunInProgress(RunKind),

    #[error("no articles crawled")]
    NoArticles,

    #[error("Run failed: {0}")]
    Run(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
