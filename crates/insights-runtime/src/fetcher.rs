//! Concurrent retrieval of every report in a coordinate space.
//!
//! Each `(kind, coordinate)` pair is a [`FetchTask`]. A fixed pool of tokio
//! workers drains a shared queue, spacing requests through one shared
//! [`RateLimiter`] and sending `(task, outcome)` pairs over an `mpsc`
//! channel. The collector merges them into a map keyed by task, so the order
//! in which results arrive does not matter. A single deadline bounds the
//! whole phase; when it passes the workers are aborted and whatever has been
//! collected so far is returned.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use insights_core::catalog::{report_url, STATS_BASE_URL};
use insights_core::models::{Coordinate, ReportKind};
use insights_core::PeriodRange;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use crate::rate_limiter::RateLimiter;
use crate::source::{FetchOutcome, ReportSource};

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRIES: u32 = 2;
/// Base unit of the linear retry back-off (attempt × base).
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 7200;

// ── Tasks ─────────────────────────────────────────────────────────────────────

/// One report to retrieve.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTask {
    pub kind: ReportKind,
    pub coordinate: Coordinate,
}

impl FetchTask {
    pub fn new(kind: ReportKind, coordinate: Coordinate) -> Self {
        Self { kind, coordinate }
    }

    pub fn url(&self, base_url: &str) -> String {
        report_url(base_url, self.kind, &self.coordinate)
    }
}

/// Every `(period, tier, threshold, kind)` combination, newest month first.
pub fn enumerate_tasks<S: AsRef<str>>(
    range: PeriodRange,
    tiers: &[S],
    thresholds: &[u32],
    kinds: &[ReportKind],
) -> Vec<FetchTask> {
    let mut tasks = Vec::with_capacity(range.len() * tiers.len() * thresholds.len() * kinds.len());
    for period in range.iter_rev() {
        for tier in tiers {
            for &threshold in thresholds {
                for &kind in kinds {
                    tasks.push(FetchTask::new(
                        kind,
                        Coordinate::new(period, tier.as_ref(), threshold),
                    ));
                }
            }
        }
    }
    tasks
}

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    /// Number of workers; clamped to at least one.
    pub concurrency: usize,
    /// Minimum spacing between any two requests of the pool.
    pub request_delay: Duration,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    pub retry_base_delay: Duration,
    /// Deadline for the whole fetch phase.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: STATS_BASE_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            retries: DEFAULT_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub succeeded: usize,
    pub not_found: usize,
    pub transient: usize,
    /// Tasks with no outcome because the deadline passed first.
    pub unfinished: usize,
    pub timed_out: bool,
}

impl FetchSummary {
    pub fn log(&self) {
        tracing::info!(
            succeeded = self.succeeded,
            not_found = self.not_found,
            transient = self.transient,
            "Fetch finished"
        );
        if self.transient > 0 {
            tracing::warn!(
                "{} reports failed after retries and were skipped",
                self.transient
            );
        }
        if self.timed_out {
            tracing::warn!(
                "Fetch deadline reached; {} reports unfinished",
                self.unfinished
            );
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchResults {
    pub outcomes: BTreeMap<FetchTask, FetchOutcome>,
    pub summary: FetchSummary,
}

impl FetchResults {
    /// Payloads of successful fetches of one kind, in coordinate order.
    pub fn successes(&self, kind: ReportKind) -> impl Iterator<Item = (&Coordinate, &str)> {
        self.outcomes.iter().filter_map(move |(task, outcome)| match outcome {
            FetchOutcome::Success(body) if task.kind == kind => {
                Some((&task.coordinate, body.as_str()))
            }
            _ => None,
        })
    }
}

// ── ReportFetcher ─────────────────────────────────────────────────────────────

pub struct ReportFetcher<S> {
    source: Arc<S>,
    limiter: Arc<RateLimiter>,
    config: FetchConfig,
}

impl<S: ReportSource + 'static> ReportFetcher<S> {
    pub fn new(source: S, config: FetchConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.request_delay));
        Self {
            source: Arc::new(source),
            limiter,
            config,
        }
    }

    /// Fetch every task. Never fails: per-task problems become outcomes, and
    /// a deadline hit returns the partial map with `summary.timed_out` set.
    pub async fn run(&self, tasks: Vec<FetchTask>) -> FetchResults {
        let total = tasks.len();
        let workers = self.config.concurrency.max(1).min(total.max(1));
        tracing::info!(
            tasks = total,
            workers,
            delay = ?self.limiter.min_interval(),
            "Starting fetch"
        );

        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let (tx, mut rx) = mpsc::channel::<(FetchTask, FetchOutcome)>(workers * 2);

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: Arc::clone(&queue),
                    source: Arc::clone(&self.source),
                    limiter: Arc::clone(&self.limiter),
                    base_url: self.config.base_url.clone(),
                    retries: self.config.retries,
                    retry_base_delay: self.config.retry_base_delay,
                };
                let tx = tx.clone();
                tokio::spawn(async move { worker.run(tx).await })
            })
            .collect();
        drop(tx);

        let deadline = Instant::now() + self.config.timeout;
        let mut results = FetchResults::default();

        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some((task, outcome))) => {
                    let url = task.url(&self.config.base_url);
                    match &outcome {
                        FetchOutcome::Success(body) => {
                            tracing::debug!(url = %url, bytes = body.len(), "fetched");
                            results.summary.succeeded += 1;
                        }
                        FetchOutcome::NotFound => {
                            tracing::info!("No report at {}", url);
                            results.summary.not_found += 1;
                        }
                        FetchOutcome::Transient(reason) => {
                            tracing::warn!(url = %url, reason = %reason, "giving up on report");
                            results.summary.transient += 1;
                        }
                    }
                    results.outcomes.insert(task, outcome);
                }
                Ok(None) => break,
                Err(_) => {
                    results.summary.timed_out = true;
                    break;
                }
            }
        }

        if results.summary.timed_out {
            for handle in &handles {
                handle.abort();
            }
        }
        results.summary.unfinished = total.saturating_sub(results.outcomes.len());
        results.summary.log();
        results
    }
}

/// State owned by one pool worker.
struct Worker<S> {
    id: usize,
    queue: Arc<Mutex<VecDeque<FetchTask>>>,
    source: Arc<S>,
    limiter: Arc<RateLimiter>,
    base_url: String,
    retries: u32,
    retry_base_delay: Duration,
}

impl<S: ReportSource> Worker<S> {
    async fn run(self, tx: mpsc::Sender<(FetchTask, FetchOutcome)>) {
        loop {
            let next = self.queue.lock().await.pop_front();
            let Some(task) = next else {
                break;
            };

            let outcome = self.fetch_with_retry(&task).await;
            if tx.send((task, outcome)).await.is_err() {
                tracing::debug!(worker = self.id, "result channel closed; stopping");
                break;
            }
        }
    }

    /// Retry transient failures with linear back-off (attempt × base delay).
    async fn fetch_with_retry(&self, task: &FetchTask) -> FetchOutcome {
        let url = task.url(&self.base_url);
        let mut last_reason = String::new();

        for attempt in 0..=self.retries {
            if attempt > 0 {
                let sleep = self.retry_base_delay * attempt;
                tracing::debug!(worker = self.id, attempt, ?sleep, "retrying after back-off");
                tokio::time::sleep(sleep).await;
            }

            self.limiter.wait().await;
            match self.source.fetch(&url).await {
                FetchOutcome::Transient(reason) => {
                    tracing::debug!(worker = self.id, attempt, url = %url, reason = %reason, "fetch attempt failed");
                    last_reason = reason;
                }
                other => return other,
            }
        }

        FetchOutcome::Transient(last_reason)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
