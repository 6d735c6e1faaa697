// src/aggregate/mod.rs
//! Fan-out / fan-in data aggregation.
//!
//! Every planned task runs concurrently and resolves to a `TaskOutcome`;
//! failures stay inside this module. Outcomes are merged in submission order,
//! never completion order, so the merged table is a function of the task list
//! and the provider answers alone.

pub mod plan;

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use futures::future::join_all;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::SharedCache;
use crate::clock::SharedClock;
use crate::error::FetchError;
use crate::metrics::{ensure_metrics_described, FETCH_ERRORS, FETCH_MS, FETCH_TIMEOUTS};
use crate::model::{Category, Claim, DataPoint};
use crate::providers::ProviderRegistry;

pub use plan::{cache_key, plan, time_bucket, FetchTask};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_millis(5000);

/// How colliding table keys are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MergePolicy {
    /// The later-submitted task's value wins.
    #[default]
    #[serde(rename = "last_submitted")]
    LastSubmittedWins,
    /// Higher confidence wins; ties go to the later submission.
    #[serde(rename = "highest_confidence")]
    HighestConfidence,
}

/// What one task resolved to.
#[derive(Debug)]
pub enum TaskOutcome {
    Cached(DataPoint),
    Fetched(DataPoint),
    Failed(FetchError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFailure {
    pub key: String,
    pub category: Category,
    pub error: String,
}

/// Merged result of one aggregation call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatedData {
    pub table: BTreeMap<String, DataPoint>,
    /// Distinct sources behind the merged table, sorted.
    pub sources: Vec<String>,
    pub failures: Vec<TaskFailure>,
    pub cache_hits: usize,
}

impl AggregatedData {
    /// Merged data points in table-key order.
    pub fn data_points(&self) -> Vec<DataPoint> {
        self.table.values().cloned().collect()
    }
}

pub struct DataAggregator {
    cache: SharedCache<DataPoint>,
    providers: ProviderRegistry,
    clock: SharedClock,
    timeout: Duration,
    policy: MergePolicy,
}

impl DataAggregator {
    pub fn new(cache: SharedCache<DataPoint>, providers: ProviderRegistry, clock: SharedClock) -> Self {
        Self {
            cache,
            providers,
            clock,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            policy: MergePolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Plan tasks for `claims` × `categories` and run them.
    pub async fn gather(&self, claims: &[Claim], categories: &[Category]) -> AggregatedData {
        let tasks = plan(claims, categories);
        debug!(target: "aggregate", tasks = tasks.len(), "planned fetch tasks");
        self.run_tasks(&tasks).await
    }

    /// Run `tasks` concurrently and merge in slice order.
    pub async fn run_tasks(&self, tasks: &[FetchTask]) -> AggregatedData {
        ensure_metrics_described();
        // join_all yields outputs in input order regardless of completion order
        let outcomes = join_all(tasks.iter().map(|t| self.run_task(t))).await;
        self.merge(tasks, outcomes)
    }

    /// Cache first; on a miss, one bounded provider call whose success is cached.
    pub async fn run_task(&self, task: &FetchTask) -> TaskOutcome {
        let cache_key = task.cache_key(self.clock.now());
        if let Some(dp) = self.cache.get(&cache_key) {
            return TaskOutcome::Cached(dp);
        }

        let Some(provider) = self.providers.get(task.category) else {
            return TaskOutcome::Failed(FetchError::NoProvider(task.category));
        };

        let started = Instant::now();
        let res = tokio::time::timeout(self.timeout, provider.resolve(&task.target)).await;
        histogram!(FETCH_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        match res {
            Err(_) => TaskOutcome::Failed(FetchError::Timeout {
                provider: provider.name().to_string(),
                after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            Ok(Err(source)) => TaskOutcome::Failed(FetchError::Provider {
                provider: provider.name().to_string(),
                source,
            }),
            Ok(Ok(value)) => {
                let mut dp = DataPoint::new(
                    provider.name(),
                    task.category.as_str(),
                    value,
                    self.clock.now(),
                )
                .confidence(provider.confidence());
                if let Some(sym) = &task.symbol {
                    dp = dp.symbol(sym.as_str());
                }
                self.cache.set(&cache_key, dp.clone(), None);
                TaskOutcome::Fetched(dp)
            }
        }
    }

    fn merge(&self, tasks: &[FetchTask], outcomes: Vec<TaskOutcome>) -> AggregatedData {
        let mut out = AggregatedData::default();

        for (task, outcome) in tasks.iter().zip(outcomes) {
            let dp = match outcome {
                TaskOutcome::Cached(dp) => {
                    out.cache_hits += 1;
                    dp
                }
                TaskOutcome::Fetched(dp) => dp,
                TaskOutcome::Failed(err) => {
                    if err.is_timeout() {
                        counter!(FETCH_TIMEOUTS).increment(1);
                    }
                    counter!(FETCH_ERRORS).increment(1);
                    warn!(
                        target: "aggregate",
                        key = %task.key,
                        category = %task.category,
                        error = %err,
                        "fetch task failed"
                    );
                    out.failures.push(TaskFailure {
                        key: task.key.clone(),
                        category: task.category,
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            let replace = match (self.policy, out.table.get(&task.key)) {
                (_, None) | (MergePolicy::LastSubmittedWins, Some(_)) => true,
                (MergePolicy::HighestConfidence, Some(prev)) => dp.confidence >= prev.confidence,
            };
            if replace {
                out.table.insert(task.key.clone(), dp);
            }
        }

        out.sources = out
            .table
            .values()
            .map(|dp| dp.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        out
    }
}
