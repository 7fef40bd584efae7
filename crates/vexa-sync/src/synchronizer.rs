//! Polling synchronizer: mirrors server-side job status into the watch set
//! and turns terminal transitions into notifications.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vexa_client::{ApiClient, ClientError, ResourceId, TrackedResource};

use crate::notifications::NotificationCenter;
use crate::task::PeriodicTask;
use crate::watch_set::{Observation, Transition, WatchSet};

/// Where the synchronizer reads the resource collection from.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<TrackedResource>, ClientError>;
}

/// The user's fine-tuned models, optionally filtered by specialization.
pub struct FineTunedModels {
    client: ApiClient,
    specialization: Option<String>,
}

impl FineTunedModels {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            specialization: None,
        }
    }

    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specialization = Some(specialization.into());
        self
    }
}

#[async_trait]
impl ResourceSource for FineTunedModels {
    async fn fetch(&self) -> Result<Vec<TrackedResource>, ClientError> {
        self.client
            .fine_tuned_models(self.specialization.as_deref())
            .await
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing watched; no request was made.
    Idle,
    /// A previous fetch was still in flight.
    Skipped,
    /// Fetch succeeded and the diff was applied.
    Applied(Vec<Transition>),
    /// Fetch failed; logged, retried next tick.
    FetchFailed,
    /// The session is gone; polling is pointless until a new login.
    SignedOut,
    /// Cancelled between fetch and apply; nothing was mutated.
    Cancelled,
}

struct Shared {
    source: Box<dyn ResourceSource>,
    watch: Mutex<WatchSet>,
    notifications: NotificationCenter,
    interval: Duration,
    in_flight: AtomicBool,
    keep_alive: AtomicBool,
}

/// Clears the in-flight flag however the tick ends, including when its
/// future is dropped by cancellation.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Watches resources for terminal transitions.
///
/// Cheap to clone; clones share the watch set.
#[derive(Clone)]
pub struct PollingSynchronizer {
    shared: Arc<Shared>,
}

impl PollingSynchronizer {
    pub fn new(
        source: impl ResourceSource + 'static,
        notifications: NotificationCenter,
        interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source: Box::new(source),
                watch: Mutex::new(WatchSet::new()),
                notifications,
                interval,
                in_flight: AtomicBool::new(false),
                keep_alive: AtomicBool::new(false),
            }),
        }
    }

    /// Keep the loop running while the watch set is empty.
    pub fn set_keep_alive(&self, keep_alive: bool) {
        self.shared.keep_alive.store(keep_alive, Ordering::Release);
    }

    pub fn track(&self, id: ResourceId) -> bool {
        let added = self.watch().track(id.clone());
        if added {
            debug!("Watching {}", id);
        }
        added
    }

    pub fn untrack(&self, id: &ResourceId) -> bool {
        self.watch().untrack(id)
    }

    pub fn watched(&self) -> Vec<ResourceId> {
        self.watch().ids()
    }

    pub fn observation(&self, id: &ResourceId) -> Option<Observation> {
        self.watch().observation(id)
    }

    pub fn is_watching(&self) -> bool {
        !self.watch().is_empty()
    }

    /// Run one fetch-and-diff cycle now.
    pub async fn tick(&self) -> TickOutcome {
        self.tick_with(&CancellationToken::new()).await
    }

    /// Spawn the polling loop. It stops when the returned handle is
    /// dropped or cancelled, when the session ends, or when the watch set
    /// empties (unless keep-alive is set).
    pub fn spawn(&self) -> PollHandle {
        let sync = self.clone();
        let task = PeriodicTask::spawn("training poller", self.shared.interval, move |token| {
            let sync = sync.clone();
            async move {
                match sync.tick_with(&token).await {
                    TickOutcome::SignedOut | TickOutcome::Cancelled => ControlFlow::Break(()),
                    _ if sync.should_stop() => ControlFlow::Break(()),
                    _ => ControlFlow::Continue(()),
                }
            }
        });
        PollHandle { task }
    }

    async fn tick_with(&self, token: &CancellationToken) -> TickOutcome {
        if self.shared.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Previous fetch still in flight, skipping tick");
            return TickOutcome::Skipped;
        }
        let _flight = InFlight(&self.shared.in_flight);

        if self.watch().is_empty() {
            return TickOutcome::Idle;
        }

        let fetched = match self.shared.source.fetch().await {
            Ok(fetched) => fetched,
            Err(ClientError::AuthExpired | ClientError::NotAuthenticated) => {
                info!("Session ended, stopping status polling");
                return TickOutcome::SignedOut;
            }
            Err(e) => {
                warn!("Status poll failed, retrying next tick: {}", e);
                return TickOutcome::FetchFailed;
            }
        };

        if token.is_cancelled() {
            return TickOutcome::Cancelled;
        }

        // One lock for the whole diff: readers see the set before or after
        // this tick, never half-applied.
        let transitions = self.watch().apply(&fetched);

        for transition in &transitions {
            info!(
                "{} moved {} -> {}",
                transition.id,
                transition
                    .from
                    .map_or("unobserved", |status| status.as_str()),
                transition.to
            );
            self.shared
                .notifications
                .notify(transition.message(), transition.severity());
        }

        TickOutcome::Applied(transitions)
    }

    fn should_stop(&self) -> bool {
        !self.shared.keep_alive.load(Ordering::Acquire) && self.watch().is_empty()
    }

    fn watch(&self) -> MutexGuard<'_, WatchSet> {
        self.shared
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Running polling loop; cancels on drop.
pub struct PollHandle {
    task: PeriodicTask,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.task.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn finished(&mut self) {
        self.task.finished().await;
    }
}
