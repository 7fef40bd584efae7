//! # Vexa Sync
//!
//! Keeps client-side state in step with the backend: polls long-running
//! training jobs, refreshes dashboard statistics and turns outcomes into
//! transient notifications.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐  fetch   ┌───────────┐
//! │PollingSynchronizer│ -------> │ ApiClient │
//! └───────────────────┘          └───────────┘
//!    │ diff (WatchSet)
//!    v
//! ┌──────────────────┐  NotificationChange  ┌───────────┐
//! │NotificationCenter│ -------------------> │ presenter │
//! └──────────────────┘                      └───────────┘
//!    ^
//!    │ one notification per action
//! ┌──────────────┐
//! │ ActionRunner │
//! └──────────────┘
//! ```
//!
//! Background loops run on [`PeriodicTask`], which stops when dropped.

mod actions;
pub mod config;
mod dashboard;
mod notifications;
mod synchronizer;
mod task;
mod watch_set;

pub use actions::{ActionRunner, AttachmentOutcome, MessageOutcome};
pub use config::SyncConfig;
pub use dashboard::{DashboardRefresher, DashboardStats, QUERY_COUNT_LIMIT};
pub use notifications::{
    Enqueued, NotificationCenter, NotificationChange, NotificationError, NotificationEvent,
    NotificationId, NotificationQueue, Severity,
};
pub use synchronizer::{
    FineTunedModels, PollHandle, PollingSynchronizer, ResourceSource, TickOutcome,
};
pub use task::PeriodicTask;
pub use watch_set::{Observation, Transition, WatchSet};
