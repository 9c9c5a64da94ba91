use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use news_pipeline::{
    ArticleStore, FetcherConfig, LlmAdapter, MemoryStore, MockLlmAdapter, OpenAiAdapter,
    PacingConfig, PgStore, RssFeedSource, RunOrchestrator, RunSummary, ScheduleConfig, Scheduler,
    SourceRegistry, SummarizerConfig, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "news-pipeline", version, about = "Scheduled news ingestion with AI summaries")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Keep articles in memory instead of PostgreSQL
    #[arg(long)]
    memory: bool,

    /// Use the offline mock summarizer
    #[arg(long)]
    mock_ai: bool,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    openai_model: String,

    /// JSON file with the source list; the built-in list is used otherwise
    #[arg(long, env = "NEWS_SOURCES_FILE")]
    sources_file: Option<PathBuf>,

    /// Pause between enrichment calls
    #[arg(long, env = "ENRICH_DELAY_MS", default_value_t = 1000)]
    enrich_delay_ms: u64,

    #[arg(long, env = "ENRICH_MAX_BATCH")]
    enrich_max_batch: Option<usize>,

    #[arg(long, env = "FETCH_CONCURRENCY", default_value_t = 1)]
    fetch_concurrency: usize,

    /// Local hour of the daily full run
    #[arg(long, env = "DAILY_HOUR", default_value_t = 6)]
    daily_hour: u32,

    #[arg(long, env = "PARTIAL_INTERVAL_HOURS", default_value_t = 3)]
    partial_interval_hours: u64,

    #[arg(long, env = "PARTIAL_SOURCE_COUNT", default_value_t = 4)]
    partial_source_count: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler until Ctrl-C
    Serve,
    /// One manual full run
    Run {
        /// Print progress events as JSON lines
        #[arg(long)]
        stream: bool,
    },
    /// One partial run over the first sources
    Partial,
    /// Full run without the summarizer
    Simple,
    /// List configured sources
    Sources,
}

impl Cli {
    fn schedule(&self) -> anyhow::Result<ScheduleConfig> {
        if self.daily_hour > 23 {
            bail!("DAILY_HOUR must be between 0 and 23, got {}", self.daily_hour);
        }
        if self.partial_interval_hours == 0 {
            bail!("PARTIAL_INTERVAL_HOURS must be positive");
        }
        Ok(ScheduleConfig {
            daily_hour: self.daily_hour,
            partial_interval: Duration::from_secs(self.partial_interval_hours * 60 * 60),
            partial_source_count: self.partial_source_count,
            ..ScheduleConfig::default()
        })
    }

    /// The live enrichment service is never called more than once a second.
    fn pacing(&self) -> PacingConfig {
        let mut delay_ms = self.enrich_delay_ms;
        if !self.mock_ai && delay_ms < 1000 {
            warn!("ENRICH_DELAY_MS={} is below the 1000ms floor, using 1000", delay_ms);
            delay_ms = 1000;
        }
        PacingConfig {
            delay: Duration::from_millis(delay_ms),
            max_batch_size: self.enrich_max_batch,
        }
    }

    fn registry(&self) -> anyhow::Result<SourceRegistry> {
        match &self.sources_file {
            Some(path) => SourceRegistry::from_json_file(path)
                .with_context(|| format!("Failed to load sources from {}", path.display())),
            None => Ok(SourceRegistry::default()),
        }
    }

    fn adapter(&self) -> anyhow::Result<Arc<dyn LlmAdapter>> {
        if self.mock_ai {
            return Ok(Arc::new(MockLlmAdapter::new("cli")));
        }
        let api_key = self
            .openai_api_key
            .clone()
            .context("OPENAI_API_KEY is required unless --mock-ai is set")?;
        let config = SummarizerConfig {
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
            ..SummarizerConfig::new(api_key)
        };
        Ok(Arc::new(OpenAiAdapter::new(config)?))
    }

    async fn store(&self) -> anyhow::Result<Arc<dyn ArticleStore>> {
        if self.memory {
            warn!("Using in-memory store, nothing will survive this process");
            return Ok(Arc::new(MemoryStore::new()));
        }
        let url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL is required unless --memory is set")?;
        let store = PgStore::connect(url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        store.ensure_schema().await.context("Failed to prepare schema")?;
        Ok(Arc::new(store))
    }
}

fn print_summary(summary: &RunSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let registry = cli.registry()?;

    if let Command::Sources = cli.command {
        for source in registry.all() {
            println!(
                "{:<16} {:<3} {:<10} {}",
                source.name,
                source.language.as_str(),
                source.category,
                source.url
            );
        }
        return Ok(());
    }

    let schedule = cli.schedule()?;
    let clock = Arc::new(SystemClock);
    let feed_source = RssFeedSource::new(FetcherConfig::default())?.with_clock(clock.clone());

    let orchestrator = Arc::new(
        RunOrchestrator::builder()
            .registry(registry)
            .feed_source(Arc::new(feed_source))
            .fetch_concurrency(cli.fetch_concurrency)
            .adapter(cli.adapter()?)
            .pacing(cli.pacing())
            .store(cli.store().await?)
            .clock(clock.clone())
            .schedule(schedule.clone())
            .build()?,
    );

    match cli.command {
        Command::Serve => {
            let scheduler = Scheduler::new(orchestrator, schedule, clock);
            scheduler.start().await?;
            info!("Scheduler running, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
            scheduler.stop().await?;
        }
        Command::Run { stream: true } => {
            let mut events = orchestrator.stream_manual_run();
            while let Some(event) = events.next().await {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Command::Run { stream: false } => {
            let summary = orchestrator.trigger_manual_run().await?;
            print_summary(&summary)?;
        }
        Command::Partial => {
            let summary = orchestrator.run_partial().await?;
            print_summary(&summary)?;
        }
        Command::Simple => {
            let summary = orchestrator.run_without_ai().await?;
            print_summary(&summary)?;
        }
        Command::Sources => {}
    }

    Ok(())
}
