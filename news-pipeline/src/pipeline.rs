use crate::aggregator::FeedAggregator;
use crate::clock::{Clock, SystemClock};
use crate::digest::DigestAggregator;
use crate::llm_adapter::LlmAdapter;
use crate::processing::EnrichmentEngine;
use crate::rss_utils::time::{is_within_window, local_day};
use crate::sources::SourceRegistry;
use crate::state::{PersistReport, PersistenceGateway};
use crate::traits::{ArticleStore, FeedSource};
use crate::types::{
    EnrichedArticle, PacingConfig, PipelineError, ProgressEvent, RawArticle, Result, RunKind,
    RunState, RunStatus, RunSummary, ScheduleConfig,
};
use crate::utils::truncate_with_ellipsis;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info, warn};

const DIGEST_PREVIEW_CHARS: usize = 100;

type Progress<'a> = Option<&'a mpsc::UnboundedSender<ProgressEvent>>;

fn emit(progress: Progress<'_>, event: ProgressEvent) {
    if let Some(tx) = progress {
        // A dropped receiver only means nobody is watching
        let _ = tx.send(event);
    }
}

/// Coordinates fetch, enrichment, persistence and the daily digest.
/// At most one run of each kind is active at a time.
pub struct RunOrchestrator {
    registry: SourceRegistry,
    aggregator: FeedAggregator,
    enrichment: EnrichmentEngine,
    gateway: PersistenceGateway,
    digests: DigestAggregator,
    clock: Arc<dyn Clock>,
    schedule: ScheduleConfig,
    active: Mutex<HashMap<RunKind, RunState>>,
    finished: Mutex<HashMap<RunKind, RunState>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Each holder updates the map in one step, so a poisoned map is still valid
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds the per-kind slot of a running pass. Dropping it without
/// `complete` (a cancelled or panicked run) records the run as failed and
/// frees the slot.
struct RunGuard<'a> {
    orchestrator: &'a RunOrchestrator,
    state: Option<RunState>,
}

impl RunGuard<'_> {
    fn complete(mut self, result: &Result<RunSummary>) {
        if let Some(state) = self.state.take() {
            let status = outcome(state.kind, result);
            self.orchestrator.release(state, status);
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            warn!(kind = %state.kind, run_id = %state.id, "Run abandoned before completion");
            self.orchestrator.release(state, RunStatus::Failed);
        }
    }
}

fn outcome(kind: RunKind, result: &Result<RunSummary>) -> RunStatus {
    match result {
        Ok(summary) => {
            info!(
                kind = %kind,
                crawled = summary.crawled,
                enriched = summary.enriched,
                saved = summary.saved,
                skipped = summary.skipped_duplicates,
                failed = summary.failed,
                "Run completed"
            );
            RunStatus::Succeeded
        }
        Err(PipelineError::NoArticles) if kind != RunKind::Manual => {
            warn!(kind = %kind, "Scheduled run found no articles");
            RunStatus::Succeeded
        }
        Err(e) => {
            error!(kind = %kind, "Run failed: {}", e);
            RunStatus::Failed
        }
    }
}

impl RunOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// The live state of a running `kind`, if any.
    pub async fn run_state(&self, kind: RunKind) -> Option<RunState> {
        lock(&self.active).get(&kind).cloned()
    }

    /// The most recent finished run of `kind`.
    pub async fn last_run(&self, kind: RunKind) -> Option<RunState> {
        lock(&self.finished).get(&kind).cloned()
    }

    /// Fetch all sources, enrich, persist and write the day's digest.
    pub async fn run_full(&self, kind: RunKind) -> Result<RunSummary> {
        let guard = self.begin(kind)?;
        let result = self.full_pass(kind, None).await;
        guard.complete(&result);
        result
    }

    pub async fn trigger_manual_run(&self) -> Result<RunSummary> {
        self.run_full(RunKind::Manual).await
    }

    /// Recent articles from the first few sources. Never writes a digest.
    pub async fn run_partial(&self) -> Result<RunSummary> {
        let guard = self.begin(RunKind::Hourly)?;
        let result = self.partial_pass().await;
        guard.complete(&result);
        result
    }

    /// Full run without the enrichment service.
    pub async fn run_without_ai(&self) -> Result<RunSummary> {
        let guard = self.begin(RunKind::Manual)?;
        let result = self.plain_pass().await;
        guard.complete(&result);
        result
    }

    /// Manual run reporting its milestones. The stream ends after exactly one
    /// `complete` or `error` event.
    pub fn stream_manual_run(self: &Arc<Self>) -> UnboundedReceiverStream<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = self.clone();

        tokio::spawn(async move {
            let guard = match orchestrator.begin(RunKind::Manual) {
                Ok(guard) => guard,
                Err(e) => {
                    emit(Some(&tx), ProgressEvent::Error { message: e.to_string() });
                    return;
                }
            };

            let result = orchestrator.full_pass(RunKind::Manual, Some(&tx)).await;
            guard.complete(&result);

            let terminal = match result {
                Ok(summary) => ProgressEvent::Complete { summary },
                Err(e) => ProgressEvent::Error { message: e.to_string() },
            };
            emit(Some(&tx), terminal);
        });

        UnboundedReceiverStream::new(rx)
    }

    fn begin(&self, kind: RunKind) -> Result<RunGuard<'_>> {
        let mut active = lock(&self.active);
        if active.contains_key(&kind) {
            warn!(kind = %kind, "Run already in progress");
            return Err(PipelineError::RunInProgress(kind));
        }
        let state = RunState::begin(kind, self.clock.now());
        active.insert(kind, state.clone());
        info!(kind = %kind, run_id = %state.id, "Run started");
        Ok(RunGuard {
            orchestrator: self,
            state: Some(state),
        })
    }

    fn release(&self, state: RunState, status: RunStatus) {
        let kind = state.kind;
        lock(&self.active).remove(&kind);
        lock(&self.finished).insert(kind, state.finish(status));
    }

    async fn full_pass(&self, kind: RunKind, progress: Progress<'_>) -> Result<RunSummary> {
        emit(progress, ProgressEvent::Crawling);
        let articles = self.aggregator.fetch_all(self.registry.all()).await;
        emit(progress, ProgressEvent::Crawled { count: articles.len() });

        if articles.is_empty() {
            return Err(PipelineError::NoArticles);
        }

        emit(progress, ProgressEvent::AiProcessing);
        let enriched = self.enrichment.enrich(&articles).await;
        emit(progress, ProgressEvent::AiCompleted { count: enriched.len() });

        emit(progress, ProgressEvent::Saving);
        let report = self.gateway.persist(&enriched).await;

        emit(progress, ProgressEvent::Digest);
        let narrative = if enriched.is_empty() {
            warn!(kind = %kind, "Nothing was enriched, no digest written");
            String::new()
        } else {
            let narrative = self.enrichment.digest(&enriched).await;
            let day = local_day(self.clock.now());
            self.digests.upsert_digest(day, &enriched, &narrative).await?;
            narrative
        };

        let attempted = self.enrichment.batch_len(articles.len());
        Ok(Self::summarize(articles.len(), attempted, &enriched, &report, &narrative))
    }

    async fn partial_pass(&self) -> Result<RunSummary> {
        let sources = self.registry.prefix(self.schedule.partial_source_count);
        let articles = self.aggregator.fetch_all(sources).await;
        if articles.is_empty() {
            info!("Partial run found no articles");
            return Ok(RunSummary::default());
        }

        let now = self.clock.now();
        let window = self.schedule.recency_window;
        let recent: Vec<RawArticle> = articles
            .iter()
            .filter(|a| is_within_window(a.published_at, now, window))
            .cloned()
            .collect();

        info!(
            "Partial run: {} of {} articles inside the last {} hours",
            recent.len(),
            articles.len(),
            window.num_hours()
        );

        if recent.is_empty() {
            return Ok(RunSummary {
                crawled: articles.len(),
                ..Default::default()
            });
        }

        let enriched = self.enrichment.enrich(&recent).await;
        let report = self.gateway.persist(&enriched).await;

        let attempted = self.enrichment.batch_len(recent.len());
        Ok(Self::summarize(articles.len(), attempted, &enriched, &report, ""))
    }

    async fn plain_pass(&self) -> Result<RunSummary> {
        let articles = self.aggregator.fetch_all(self.registry.all()).await;
        if articles.is_empty() {
            return Err(PipelineError::NoArticles);
        }

        let enriched = EnrichmentEngine::enrich_without_ai(&articles);
        let report = self.gateway.persist(&enriched).await;

        let narrative = format!(
            "今日共抓取 {} 篇新闻文章，涵盖了多个分类。",
            report.stored.len()
        );
        let stored: Vec<EnrichedArticle> =
            report.stored.iter().map(|s| s.article.clone()).collect();
        let day = local_day(self.clock.now());
        self.digests.upsert_digest(day, &stored, &narrative).await?;

        Ok(Self::summarize(articles.len(), articles.len(), &enriched, &report, &narrative))
    }

    /// `failed` counts articles dropped during enrichment plus failed saves.
    /// Articles left out by the batch limit are not failures.
    fn summarize(
        crawled: usize,
        attempted: usize,
        enriched: &[EnrichedArticle],
        report: &PersistReport,
        narrative: &str,
    ) -> RunSummary {
        RunSummary {
            crawled,
            enriched: enriched.len(),
            saved: report.stored.len(),
            skipped_duplicates: report.skipped_duplicates,
            failed: attempted.saturating_sub(enriched.len()) + report.failed,
            digest_preview: if narrative.is_empty() {
                String::new()
            } else {
                truncate_with_ellipsis(narrative, DIGEST_PREVIEW_CHARS)
            },
        }
    }
}

/// Builder for `RunOrchestrator`
pub struct OrchestratorBuilder {
    registry: SourceRegistry,
    feed_source: Option<Arc<dyn FeedSource>>,
    fetch_concurrency: usize,
    adapter: Option<Arc<dyn LlmAdapter>>,
    pacing: PacingConfig,
    store: Option<Arc<dyn ArticleStore>>,
    clock: Arc<dyn Clock>,
    schedule: ScheduleConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            registry: SourceRegistry::default(),
            feed_source: None,
            fetch_concurrency: 1,
            adapter: None,
            pacing: PacingConfig::default(),
            store: None,
            clock: Arc::new(SystemClock),
            schedule: ScheduleConfig::default(),
        }
    }

    pub fn registry(mut self, registry: SourceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn feed_source(mut self, feed_source: Arc<dyn FeedSource>) -> Self {
        self.feed_source = Some(feed_source);
        self
    }

    pub fn fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency;
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn LlmAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn store(mut self, store: Arc<dyn ArticleStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn build(self) -> Result<RunOrchestrator> {
        let feed_source = self
            .feed_source
            .ok_or_else(|| PipelineError::Config("no feed source configured".to_string()))?;
        let adapter = self
            .adapter
            .ok_or_else(|| PipelineError::Config("no enrichment adapter configured".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| PipelineError::Config("no article store configured".to_string()))?;

        info!(
            "Orchestrator ready: {} sources, {} via {}",
            self.registry.len(),
            adapter.adapter_name(),
            feed_source.source_name()
        );

        Ok(RunOrchestrator {
            registry: self.registry,
            aggregator: FeedAggregator::new(feed_source).with_concurrency(self.fetch_concurrency),
            enrichment: EnrichmentEngine::new(adapter, self.pacing),
            gateway: PersistenceGateway::new(store.clone()),
            digests: DigestAggregator::new(store),
            clock: self.clock,
            schedule: self.schedule,
            active: Mutex::new(HashMap::new()),
            finished: Mutex::new(HashMap::new()),
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
