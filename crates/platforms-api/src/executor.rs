//! Parallel per-channel query fan-out.
//!
//! Every provider integration funnels its per-channel queries through
//! [`ParallelQueryExecutor`]: one broken or slow channel must never stall
//! or corrupt the refresh of any other.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::identity::ChannelIdentifier;
use crate::livestream::LivestreamModel;
use crate::query::LivestreamQueryResult;

/// Default shared wall-clock timeout for one fan-out batch.
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the query executor.
#[derive(Debug, Clone)]
pub struct QueryExecutorConfig {
    /// Shared deadline for the whole batch, not per item.
    pub timeout: Duration,
}

impl Default for QueryExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Fan-out executor for independent per-channel queries.
///
/// # Contract
///
/// `query_all` runs all N queries concurrently under one shared wall-clock
/// timeout and always returns exactly N results, one per input, in
/// completion order (no ordering guarantee relative to the input).
///
/// - **Fault isolation**: an error in the query for channel `k` becomes a
///   failure result for `k` alone; it never aborts or corrupts the
///   results of the other channels. A panicking query is contained the
///   same way.
/// - **Timeout and cancellation**: at the deadline the executor cancels
///   the [`CancellationToken`] handed to every query, aborts the still
///   pending tasks and synthesizes an [`ApiError::Timeout`] failure for
///   each of them. Cancellation propagation is explicit: cooperative
///   queries observe their token and stop early; non-cooperative ones are
///   dropped at the next await point.
/// - **Abandonment**: a query that completes after the deadline is
///   discarded. Queries must therefore return freshly constructed models
///   and never mutate shared state on completion.
#[derive(Debug, Clone, Default)]
pub struct ParallelQueryExecutor {
    config: QueryExecutorConfig,
}

impl ParallelQueryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QueryExecutorConfig) -> Self {
        Self { config }
    }

    /// The shared batch timeout.
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Query all channels concurrently; see the type-level contract.
    pub async fn query_all<Q, Fut>(
        &self,
        channels: Vec<ChannelIdentifier>,
        query: Q,
    ) -> Vec<LivestreamQueryResult>
    where
        Q: Fn(ChannelIdentifier, CancellationToken) -> Fut,
        Fut: Future<Output = crate::error::Result<LivestreamModel>> + Send + 'static,
    {
        if channels.is_empty() {
            return Vec::new();
        }

        let total = channels.len();
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut outstanding: HashMap<tokio::task::Id, ChannelIdentifier> = HashMap::new();

        for channel in channels {
            let fut = query(channel.clone(), cancel.child_token());
            let task_channel = channel.clone();
            let handle = tasks.spawn(async move {
                match fut.await {
                    Ok(model) => LivestreamQueryResult::success(model),
                    Err(error) => LivestreamQueryResult::failed(task_channel, error),
                }
            });
            outstanding.insert(handle.id(), channel);
        }

        let mut results = Vec::with_capacity(total);
        let deadline = tokio::time::sleep(self.config.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = tasks.join_next_with_id() => {
                    match joined {
                        Some(Ok((id, result))) => {
                            outstanding.remove(&id);
                            results.push(result);
                        }
                        Some(Err(join_error)) => {
                            // A panicking query is contained to its own slot.
                            if let Some(channel) = outstanding.remove(&join_error.id()) {
                                warn!(%channel, "channel query task failed: {join_error}");
                                results.push(LivestreamQueryResult::failed(
                                    channel,
                                    ApiError::Other(format!("query task failed: {join_error}")),
                                ));
                            }
                        }
                        None => break,
                    }
                }
                _ = &mut deadline => {
                    debug!(
                        pending = outstanding.len(),
                        timeout = ?self.config.timeout,
                        "query batch deadline reached, abandoning pending queries"
                    );
                    cancel.cancel();
                    tasks.abort_all();
                    break;
                }
            }
        }

        // Whatever did not complete before the deadline is abandoned: its
        // (possibly still running) work is discarded and it reports as a
        // timeout failure.
        for (_, channel) in outstanding {
            results.push(LivestreamQueryResult::failed(
                channel,
                ApiError::Timeout {
                    timeout: self.config.timeout,
                },
            ));
        }

        debug_assert_eq!(results.len(), total);
        results
    }
}
