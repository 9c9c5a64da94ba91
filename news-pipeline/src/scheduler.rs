use crate::clock::Clock;
use crate::pipeline::RunOrchestrator;
use crate::types::{PipelineError, Result, RunKind, ScheduleConfig};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// When a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every day at this local wall-clock time.
    DailyAt { hour: u32, minute: u32 },
    /// Repeatedly, the first firing one period after start.
    Every(Duration),
}

impl Schedule {
    /// Time from `now` until the next firing. A firing exactly at `now` is
    /// treated as already past.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        match *self {
            Schedule::Every(period) => period,
            Schedule::DailyAt { hour, minute } => {
                let Some(at) = NaiveTime::from_hms_opt(hour, minute, 0) else {
                    return Duration::from_secs(24 * 60 * 60);
                };
                let today = now.with_timezone(&Local).date_naive();

                // Days whose local time does not exist (DST gap) are skipped
                (0..=2)
                    .filter_map(|offset| {
                        let day = today + ChronoDuration::days(offset);
                        Local.from_local_datetime(&day.and_time(at)).earliest()
                    })
                    .map(|fire_at| fire_at.with_timezone(&Utc))
                    .find(|fire_at| *fire_at > now)
                    .and_then(|fire_at| (fire_at - now).to_std().ok())
                    .unwrap_or(Duration::from_secs(24 * 60 * 60))
            }
        }
    }
}

/// Fires daily full runs and periodic partial runs.
pub struct Scheduler {
    orchestrator: Arc<RunOrchestrator>,
    triggers: Vec<(RunKind, Schedule)>,
    clock: Arc<dyn Clock>,
    handles: RwLock<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<RunOrchestrator>,
        config: ScheduleConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let triggers = vec![
            (
                RunKind::Daily,
                Schedule::DailyAt {
                    hour: config.daily_hour,
                    minute: config.daily_minute,
                },
            ),
            (RunKind::Hourly, Schedule::Every(config.partial_interval)),
        ];

        Self {
            orchestrator,
            triggers,
            clock,
            handles: RwLock::new(Vec::new()),
        }
    }

    pub fn triggers(&self) -> &[(RunKind, Schedule)] {
        &self.triggers
    }

    pub async fn is_started(&self) -> bool {
        !self.handles.read().await.is_empty()
    }

    /// Register one task per trigger. Calling it again while started is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut handles = self.handles.write().await;
        if !handles.is_empty() {
            info!("Scheduler already started");
            return Ok(());
        }

        for (kind, schedule) in &self.triggers {
            if let Schedule::Every(period) = schedule {
                if period.is_zero() {
                    return Err(PipelineError::Config(format!(
                        "{} trigger period must be positive",
                        kind
                    )));
                }
            }
        }

        for (kind, schedule) in self.triggers.iter().copied() {
            let orchestrator = self.orchestrator.clone();
            let clock = self.clock.clone();
            handles.push(tokio::spawn(trigger_loop(kind, schedule, orchestrator, clock)));
            info!(kind = %kind, "Registered trigger {:?}", schedule);
        }

        info!("Scheduler started with {} triggers", handles.len());
        Ok(())
    }

    /// Cancel future firings. Runs already in flight continue.
    pub async fn stop(&self) -> Result<()> {
        let mut handles = self.handles.write().await;
        if handles.is_empty() {
            debug!("Scheduler not running, nothing to stop");
            return Ok(());
        }
        for handle in handles.drain(..) {
            handle.abort();
        }
        info!("Scheduler stopped");
        Ok(())
    }
}

async fn trigger_loop(
    kind: RunKind,
    schedule: Schedule,
    orchestrator: Arc<RunOrchestrator>,
    clock: Arc<dyn Clock>,
) {
    loop {
        let delay = schedule.next_delay(clock.now());
        debug!(kind = %kind, "Next firing in {}s", delay.as_secs());
        tokio::time::sleep(delay).await;

        // Detached so stopping the trigger never cancels a run
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { fire(kind, &orchestrator).await });
    }
}

async fn fire(kind: RunKind, orchestrator: &RunOrchestrator) {
    info!(kind = %kind, "Trigger fired");
    let result = match kind {
        RunKind::Hourly => orchestrator.run_partial().await,
        other => orchestrator.run_full(other).await,
    };

    match result {
        Ok(summary) => info!(kind = %kind, saved = summary.saved, "Scheduled run finished"),
        Err(PipelineError::RunInProgress(_)) => {
            warn!(kind = %kind, "Previous run still active, skipping this firing")
        }
        Err(PipelineError::NoArticles) => warn!(kind = %kind, "Scheduled run crawled nothing"),
        Err(e) => error!(kind = %kind, "Scheduled run failed: {}", e),
    }
}
