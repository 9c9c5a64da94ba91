mod common;

use common::*;
use futures::StreamExt;
use news_pipeline::rss_utils::time::local_day;
use news_pipeline::{
    ArticleStore, MemoryStore, MockLlmAdapter, PacingConfig, PipelineError, ProgressEvent,
    RunKind, RunOrchestrator, RunStatus, SourceRegistry,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::test]
async fn test_failed_enrichment_drops_one_article() {
    init_tracing();
    let feed = StaticFeed::new().serve(
        "wire",
        (0..3).map(|n| raw("wire", n, noon() - hours(1))).collect(),
    );
    let adapter = Arc::new(MockLlmAdapter::new("test").failing_on("https://wire.example/articles/1"));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(
        vec![source("wire")],
        Arc::new(feed),
        adapter,
        store.clone(),
        Arc::new(FixedClock(noon())),
    );

    let summary = orchestrator.trigger_manual_run().await.unwrap();
    info!("Summary: {:?}", summary);

    assert_eq!(summary.crawled, 3);
    assert_eq!(summary.enriched, 2);
    assert_eq!(summary.saved, 2);
    assert_eq!(summary.failed, 1);
    assert!(!store.exists_by_url("https://wire.example/articles/1").await.unwrap());

    for stored in store.articles().await {
        assert!(stored.article.tags.len() <= 5);
        assert!(["positive", "negative", "neutral"].contains(&stored.article.sentiment.as_str()));
    }
}

#[tokio::test]
async fn test_second_manual_run_skips_stored_article() {
    init_tracing();
    let feed = Arc::new(StaticFeed::new().serve("wire", vec![raw("wire", 0, noon())]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(
        vec![source("wire")],
        feed,
        mock_adapter(),
        store.clone(),
        Arc::new(FixedClock(noon())),
    );

    let first = orchestrator.trigger_manual_run().await.unwrap();
    assert_eq!((first.saved, first.skipped_duplicates), (1, 0));

    let second = orchestrator.trigger_manual_run().await.unwrap();
    assert_eq!((second.saved, second.skipped_duplicates), (0, 1));
    assert_eq!(store.count_articles().await.unwrap(), 1);
}

#[tokio::test]
async fn test_failing_source_does_not_abort_run() {
    init_tracing();
    // "down" has no canned articles, so fetching it fails
    let feed = StaticFeed::new()
        .serve("first", vec![raw("first", 0, noon())])
        .serve("third", vec![raw("third", 0, noon())]);
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(
        vec![source("first"), source("down"), source("third")],
        Arc::new(feed),
        mock_adapter(),
        store.clone(),
        Arc::new(FixedClock(noon())),
    );

    let summary = orchestrator.trigger_manual_run().await.unwrap();
    assert_eq!(summary.crawled, 2);
    assert_eq!(summary.saved, 2);
}

#[tokio::test]
async fn test_full_run_writes_one_digest_per_day() {
    init_tracing();
    let feed = Arc::new(StaticFeed::new().serve("wire", vec![raw("wire", 0, noon())]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(
        vec![source("wire")],
        feed,
        mock_adapter(),
        store.clone(),
        Arc::new(FixedClock(noon())),
    );

    let first = orchestrator.run_full(RunKind::Daily).await.unwrap();
    assert!(first.digest_preview.starts_with("Mock digest: 1 articles"));

    let day = local_day(noon());
    let digest = store.digest_for(day).await.unwrap().unwrap();
    assert_eq!(digest.total_articles, 1);
    assert_eq!(digest.top_categories, vec!["general"]);

    orchestrator.trigger_manual_run().await.unwrap();
    let kept = store.digest_for(day).await.unwrap().unwrap();
    assert_eq!(kept, digest);

    let last = orchestrator.last_run(RunKind::Daily).await.unwrap();
    assert_eq!(last.status, RunStatus::Succeeded);
    assert!(orchestrator.run_state(RunKind::Daily).await.is_none());
}

#[tokio::test]
async fn test_partial_run_enriches_only_recent_articles() {
    init_tracing();
    let now = noon();
    let mut articles: Vec<_> = (0..8).map(|n| raw("wire", n, now - hours(7 + n as i64))).collect();
    articles.push(raw("wire", 8, now - hours(1)));
    articles.push(raw("wire", 9, now - hours(5)));
    // Exactly on the boundary is outside the window
    articles[0].published_at = now - hours(6);

    let adapter = mock_adapter();
    let calls = adapter.call_counter();
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(
        vec![source("wire")],
        Arc::new(StaticFeed::new().serve("wire", articles)),
        adapter,
        store.clone(),
        Arc::new(FixedClock(now)),
    );

    let summary = orchestrator.run_partial().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(summary.crawled, 10);
    assert_eq!(summary.saved, 2);
    assert!(summary.digest_preview.is_empty());
    assert!(store.digest_for(local_day(now)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_partial_run_visits_first_sources_only() {
    init_tracing();
    let names = ["a", "b", "c", "d", "e", "f"];
    let feed = names
        .iter()
        .fold(StaticFeed::new(), |feed, name| feed.serve(name, vec![raw(name, 0, noon())]));
    let feed = Arc::new(feed);
    let orchestrator = orchestrator(
        names.iter().map(|n| source(n)).collect(),
        feed.clone(),
        mock_adapter(),
        Arc::new(MemoryStore::new()),
        Arc::new(FixedClock(noon())),
    );

    let summary = orchestrator.run_partial().await.unwrap();
    assert_eq!(feed.calls(), 4);
    assert_eq!(summary.saved, 4);
}

#[tokio::test]
async fn test_store_constraint_catches_race() {
    init_tracing();
    let feed = Arc::new(StaticFeed::new().serve("wire", vec![raw("wire", 0, noon())]));
    let store = Arc::new(RacingStore {
        inner: MemoryStore::new(),
    });
    let orchestrator = orchestrator(
        vec![source("wire")],
        feed,
        mock_adapter(),
        store.clone(),
        Arc::new(FixedClock(noon())),
    );

    orchestrator.trigger_manual_run().await.unwrap();
    let second = orchestrator.trigger_manual_run().await.unwrap();

    assert_eq!(second.saved, 0);
    assert_eq!(second.skipped_duplicates, 1);
    assert_eq!(second.failed, 0);
    assert_eq!(store.count_articles().await.unwrap(), 1);
}

#[tokio::test]
async fn test_same_kind_runs_do_not_overlap() {
    init_tracing();
    let feed = Arc::new(GatedFeed::new(
        StaticFeed::new().serve("wire", vec![raw("wire", 0, noon())]),
    ));
    let gate = feed.gate();
    let orchestrator = Arc::new(orchestrator(
        vec![source("wire")],
        feed.clone(),
        mock_adapter(),
        Arc::new(MemoryStore::new()),
        Arc::new(FixedClock(noon())),
    ));

    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.trigger_manual_run().await })
    };
    while orchestrator.run_state(RunKind::Manual).await.is_none() {
        tokio::task::yield_now().await;
    }

    let rejected = orchestrator.trigger_manual_run().await;
    assert!(matches!(rejected, Err(PipelineError::RunInProgress(RunKind::Manual))));

    // A different kind is not blocked
    let partial = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run_partial().await })
    };
    while orchestrator.run_state(RunKind::Hourly).await.is_none() {
        tokio::task::yield_now().await;
    }

    gate.notify_one();
    gate.notify_one();
    let first = running.await.unwrap();
    let hourly = partial.await.unwrap();
    assert!(first.is_ok());
    assert!(hourly.is_ok());
}

#[tokio::test]
async fn test_progress_events_in_order() {
    init_tracing();
    let feed = Arc::new(StaticFeed::new().serve("wire", vec![raw("wire", 0, noon())]));
    let orchestrator = Arc::new(orchestrator(
        vec![source("wire")],
        feed,
        mock_adapter(),
        Arc::new(MemoryStore::new()),
        Arc::new(FixedClock(noon())),
    ));

    let events: Vec<ProgressEvent> = orchestrator.stream_manual_run().collect().await;
    let steps: Vec<_> = events.iter().map(|e| e.step()).collect();
    assert_eq!(
        steps,
        vec!["crawling", "crawled", "ai_processing", "ai_completed", "saving", "digest", "complete"]
    );
    assert_eq!(events[1], ProgressEvent::Crawled { count: 1 });
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    match events.last() {
        Some(ProgressEvent::Complete { summary }) => assert_eq!(summary.saved, 1),
        other => panic!("unexpected terminal event: {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_crawl_ends_stream_with_error() {
    init_tracing();
    let feed = Arc::new(StaticFeed::new().serve("wire", vec![]));
    let orchestrator = Arc::new(orchestrator(
        vec![source("wire")],
        feed,
        mock_adapter(),
        Arc::new(MemoryStore::new()),
        Arc::new(FixedClock(noon())),
    ));

    let events: Vec<ProgressEvent> = orchestrator.stream_manual_run().collect().await;
    assert_eq!(
        events,
        vec![
            ProgressEvent::Crawling,
            ProgressEvent::Crawled { count: 0 },
            ProgressEvent::Error {
                message: "no articles crawled".to_string()
            },
        ]
    );

    assert!(matches!(
        orchestrator.trigger_manual_run().await,
        Err(PipelineError::NoArticles)
    ));
    let last = orchestrator.last_run(RunKind::Manual).await.unwrap();
    assert_eq!(last.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_run_without_ai() {
    init_tracing();
    let feed = Arc::new(StaticFeed::new().serve(
        "wire",
        vec![raw("wire", 0, noon()), raw("wire", 1, noon())],
    ));
    let adapter = mock_adapter();
    let calls = adapter.call_counter();
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(
        vec![source("wire")],
        feed,
        adapter,
        store.clone(),
        Arc::new(FixedClock(noon())),
    );

    let summary = orchestrator.run_without_ai().await.unwrap();
    assert_eq!(summary.saved, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    for stored in store.articles().await {
        assert!(stored.article.summary.ends_with("..."));
        assert_eq!(stored.article.tags, vec!["news"]);
    }

    let digest = store.digest_for(local_day(noon())).await.unwrap().unwrap();
    assert_eq!(digest.overall_summary, "今日共抓取 2 篇新闻文章，涵盖了多个分类。");
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_releases_its_slot() {
    init_tracing();
    let feed = Arc::new(GatedFeed::new(
        StaticFeed::new().serve("wire", vec![raw("wire", 0, noon())]),
    ));
    let gate = feed.gate();
    let orchestrator = orchestrator(
        vec![source("wire")],
        feed,
        mock_adapter(),
        Arc::new(MemoryStore::new()),
        Arc::new(FixedClock(noon())),
    );

    let cancelled =
        tokio::time::timeout(Duration::from_millis(50), orchestrator.trigger_manual_run()).await;
    assert!(cancelled.is_err());
    assert!(orchestrator.run_state(RunKind::Manual).await.is_none());
    let last = orchestrator.last_run(RunKind::Manual).await.unwrap();
    assert_eq!(last.status, RunStatus::Failed);

    gate.notify_one();
    let retried = orchestrator.trigger_manual_run().await.unwrap();
    assert_eq!(retried.saved, 1);
}

#[tokio::test]
async fn test_run_without_ai_digest_counts_stored_articles_only() {
    init_tracing();
    let feed = Arc::new(StaticFeed::new().serve(
        "wire",
        vec![raw("wire", 0, noon()), raw("wire", 0, noon()), raw("wire", 1, noon())],
    ));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(
        vec![source("wire")],
        feed,
        mock_adapter(),
        store.clone(),
        Arc::new(FixedClock(noon())),
    );

    let summary = orchestrator.run_without_ai().await.unwrap();
    assert_eq!(summary.saved, 2);
    assert_eq!(summary.skipped_duplicates, 1);

    let digest = store.digest_for(local_day(noon())).await.unwrap().unwrap();
    assert_eq!(digest.total_articles, 2);
    assert_eq!(digest.overall_summary, "今日共抓取 2 篇新闻文章，涵盖了多个分类。");
}

#[tokio::test]
async fn test_batch_limit_is_not_counted_as_failure() {
    init_tracing();
    let feed = Arc::new(StaticFeed::new().serve(
        "wire",
        (0..3).map(|n| raw("wire", n, noon())).collect(),
    ));
    let adapter = mock_adapter();
    let calls = adapter.call_counter();
    let orchestrator = RunOrchestrator::builder()
        .registry(SourceRegistry::new(vec![source("wire")]).unwrap())
        .feed_source(feed)
        .adapter(adapter)
        .pacing(PacingConfig {
            delay: Duration::ZERO,
            max_batch_size: Some(2),
        })
        .store(Arc::new(MemoryStore::new()))
        .clock(Arc::new(FixedClock(noon())))
        .build()
        .unwrap();

    let summary = orchestrator.trigger_manual_run().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(summary.crawled, 3);
    assert_eq!(summary.enriched, 2);
    assert_eq!(summary.saved, 2);
    assert_eq!(summary.failed, 0);
}
