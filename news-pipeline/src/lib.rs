pub mod types;
pub mod clock;
pub mod traits;
pub mod fetcher;
pub mod parser;
pub mod rss_utils;
pub mod utils;
pub mod sources;
pub mod aggregator;
pub mod llm_adapter;
pub mod processing;
pub mod store;
pub mod state;
pub mod digest;
pub mod pipeline;
pub mod scheduler;

pub use types::*;
pub use clock::{Clock, SystemClock, TokioClock};
pub use traits::{ArticleStore, FeedSource};
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use sources::{RssFeedSource, SourceRegistry};
pub use aggregator::FeedAggregator;
pub use llm_adapter::{LlmAdapter, MockLlmAdapter, OpenAiAdapter};
pub use processing::EnrichmentEngine;
pub use store::{MemoryStore, PgStore};
pub use state::{PersistReport, PersistenceGateway};
pub use digest::{DigestAggregator, DigestStats};
pub use pipeline::{OrchestratorBuilder, RunOrchestrator};
pub use scheduler::{Schedule, Scheduler};
