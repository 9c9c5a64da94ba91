use crate::digest::DigestStats;
use crate::types::{Language, PipelineError, RawArticle, Result, SummarizerConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Content beyond this many characters is not sent for summarization.
const MAX_PROMPT_CHARS: usize = 4000;

/// External enrichment service that writes summaries.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Get the name of this LLM adapter
    fn adapter_name(&self) -> String;

    /// Short summary of one article, in the article's language.
    async fn summarize_article(&self, article: &RawArticle) -> Result<String>;

    /// Run-level narrative written from aggregate statistics.
    async fn narrate_digest(&self, stats: &DigestStats) -> Result<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
pub struct OpenAiAdapter {
    http: reqwest::Client,
    config: SummarizerConfig,
}

impl OpenAiAdapter {
    pub fn new(config: SummarizerConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PipelineError::Config("OpenAI API key is not set".to_string()));
        }
        let http = reqwest::Client::builder()
            .user_agent("News-Pipeline/1.0")
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { http, config })
    }

    fn article_prompt(article: &RawArticle) -> String {
        let content: String = article.raw_content.chars().take(MAX_PROMPT_CHARS).collect();
        let reply_in = match article.language {
            Language::Zh => "Chinese",
            Language::En => "English",
        };
        format!(
            "Summarize the following news article in no more than 100 words.\n\n\
             Title: {}\nContent: {}\n\n\
             Requirements:\n1. Keep the core information\n2. Stay objective and neutral\n\
             3. Highlight the key facts\n4. Reply in {}",
            article.title, content, reply_in
        )
    }

    fn digest_prompt(stats: &DigestStats) -> String {
        let headlines = stats
            .top_titles
            .iter()
            .map(|t| format!("• {}", t))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Write today's news digest from these statistics.\n\n\
             Total articles: {}\nBy category: {}\n\nHeadlines:\n{}\n\n\
             Keep it under 200 words and cover the overall picture, the main topics \
             and the most important events.",
            stats.total_articles,
            stats.category_line(),
            headlines
        )
    }

    async fn complete(&self, system: &str, user: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens,
            temperature,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Enrichment(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(PipelineError::Enrichment(format!("HTTP {}: {}", status.as_u16(), snippet)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Enrichment(format!("unreadable response: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(PipelineError::Enrichment("empty completion".to_string()));
        }
        Ok(content)
    }
}

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    fn adapter_name(&self) -> String {
        format!("OpenAI ({})", self.config.model)
    }

    async fn summarize_article(&self, article: &RawArticle) -> Result<String> {
        debug!("Summarizing {}", article.original_url);
        self.complete(
            "You are a professional news summarization assistant who extracts the core of an article quickly.",
            &Self::article_prompt(article),
            200,
            0.3,
        )
        .await
    }

    async fn narrate_digest(&self, stats: &DigestStats) -> Result<String> {
        info!("Requesting digest narrative for {} articles", stats.total_articles);
        self.complete(
            "You are a professional news analyst who summarizes the day's news.",
            &Self::digest_prompt(stats),
            300,
            0.4,
        )
        .await
    }
}

/// Mock LLM adapter for development and testing
pub struct MockLlmAdapter {
    name: String,
    response_delay_ms: u64,
    failing_urls: HashSet<String>,
    fail_narrative: bool,
    calls: Arc<AtomicUsize>,
}

impl MockLlmAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response_delay_ms: 0,
            failing_urls: HashSet::new(),
            fail_narrative: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    /// Summaries for this URL will fail.
    pub fn failing_on(mut self, url: impl Into<String>) -> Self {
        self.failing_urls.insert(url.into());
        self
    }

    pub fn failing_narrative(mut self) -> Self {
        self.fail_narrative = true;
        self
    }

    /// Shared counter of `summarize_article` calls.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    async fn simulate_processing(&self) {
        if self.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.response_delay_ms)).await;
        }
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    fn adapter_name(&self) -> String {
        format!("Mock LLM Adapter ({})", self.name)
    }

    async fn summarize_article(&self, article: &RawArticle) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_processing().await;

        if self.failing_urls.contains(&article.original_url) {
            warn!("Mock adapter failing on {}", article.original_url);
            return Err(PipelineError::Enrichment(format!(
                "mock failure for {}",
                article.original_url
            )));
        }

        // Simple extractive summary: title plus the first sentence
        let first_sentence = article
            .raw_content
            .split(['.', '。'])
            .next()
            .unwrap_or("")
            .trim();
        let summary = if first_sentence.is_empty() {
            article.title.clone()
        } else {
            format!("{}: {}", article.title, first_sentence)
        };
        Ok(summary)
    }

    async fn narrate_digest(&self, stats: &DigestStats) -> Result<String> {
        self.simulate_processing().await;

        if self.fail_narrative {
            return Err(PipelineError::Enrichment("mock narrative failure".to_string()));
        }
        Ok(format!(
            "Mock digest: {} articles across {} categories. {}",
            stats.total_articles,
            stats.category_counts.len(),
            stats.top_titles.join(" | ")
        ))
    }
}
