//! Periodic dashboard statistics.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use vexa_client::{ApiClient, ClientError, ResourceStatus};

use crate::task::PeriodicTask;

/// Number of history entries requested to count queries. The backend has
/// no count endpoint, so larger histories are reported as at least this.
pub const QUERY_COUNT_LIMIT: u32 = 1000;

/// Snapshot shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_queries: usize,
    /// The history filled a whole page; the real total may be higher.
    pub queries_capped: bool,
    pub llm_models: usize,
    pub fine_tuned_models: usize,
    pub training_models: usize,
    pub ready_models: usize,
    /// `None` until the first successful health check.
    pub backend_healthy: Option<bool>,
    /// Number of completed refreshes.
    pub refreshed: u64,
}

impl DashboardStats {
    /// Query count for display, `1000+` when the history was cut off.
    pub fn queries_label(&self) -> String {
        if self.queries_capped {
            format!("{}+", self.total_queries)
        } else {
            self.total_queries.to_string()
        }
    }
}

/// Gathers [`DashboardStats`] and publishes them on a watch channel.
///
/// Each source is fetched independently; a failing source keeps its
/// previous value.
#[derive(Clone)]
pub struct DashboardRefresher {
    client: ApiClient,
    stats: watch::Sender<DashboardStats>,
}

impl DashboardRefresher {
    pub fn new(client: ApiClient) -> Self {
        let (stats, _) = watch::channel(DashboardStats::default());
        Self { client, stats }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardStats> {
        self.stats.subscribe()
    }

    pub fn current(&self) -> DashboardStats {
        self.stats.borrow().clone()
    }

    /// Fetch all sources once and publish the merged result.
    ///
    /// Only a missing or expired session is reported; other failures are
    /// logged.
    pub async fn refresh(&self) -> Result<DashboardStats, ClientError> {
        let (queries, models, fine_tuned, health) = tokio::join!(
            self.client.queries(0, QUERY_COUNT_LIMIT),
            self.client.models(),
            self.client.fine_tuned_models(None),
            self.client.health(),
        );

        let mut next = self.current();
        let mut ended = None;

        match queries {
            Ok(list) => {
                next.total_queries = list.len();
                next.queries_capped = list.len() >= QUERY_COUNT_LIMIT as usize;
            }
            Err(e) => ended = ended.or(Self::skip("query history", e)),
        }
        match models {
            Ok(list) => next.llm_models = list.len(),
            Err(e) => ended = ended.or(Self::skip("models", e)),
        }
        match fine_tuned {
            Ok(list) => {
                next.fine_tuned_models = list.len();
                next.training_models = list
                    .iter()
                    .filter(|m| m.status == ResourceStatus::Running)
                    .count();
                next.ready_models = list
                    .iter()
                    .filter(|m| m.status == ResourceStatus::Completed)
                    .count();
            }
            Err(e) => ended = ended.or(Self::skip("fine-tuned models", e)),
        }
        match health {
            Ok(report) => next.backend_healthy = Some(report.is_healthy()),
            Err(e) => {
                ended = ended.or(Self::skip("health", e));
                next.backend_healthy = Some(false);
            }
        }

        if let Some(e) = ended {
            return Err(e);
        }

        next.refreshed += 1;
        self.stats.send_replace(next.clone());
        debug!("Dashboard refreshed ({} queries)", next.total_queries);
        Ok(next)
    }

    /// Refresh every `interval` until the session ends or the task is
    /// dropped.
    pub fn spawn(&self, interval: Duration) -> PeriodicTask {
        let refresher = self.clone();
        PeriodicTask::spawn("dashboard refresher", interval, move |token| {
            let refresher = refresher.clone();
            async move {
                if token.is_cancelled() {
                    return ControlFlow::Break(());
                }
                match refresher.refresh().await {
                    Err(ClientError::AuthExpired | ClientError::NotAuthenticated) => {
                        info!("Session ended, stopping dashboard refresh");
                        ControlFlow::Break(())
                    }
                    _ => ControlFlow::Continue(()),
                }
            }
        })
    }

    /// Logs a failed source; hands back session errors.
    fn skip(source: &str, error: ClientError) -> Option<ClientError> {
        match error {
            ClientError::AuthExpired | ClientError::NotAuthenticated => Some(error),
            other => {
                warn!("Dashboard: could not load {}: {}", source, other);
                None
            }
        }
    }
}
