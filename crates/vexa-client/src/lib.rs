//! # Vexa Client
//!
//! Typed access to the Vexa assistant backend, with the session guard that
//! owns the bearer credential.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │    Caller       │ --> │    ApiClient    │ --> │  Backend (HTTP) │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!                               │
//!                         ┌─────┴─────┐
//!                         │ AuthGuard │ --> SessionStore (disk)
//!                         └───────────┘
//! ```
//!
//! Every request reads the bearer token from the [`AuthGuard`]. A 401/403 on
//! an authenticated call signs the whole process out and surfaces as
//! [`ClientError::AuthExpired`].
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use vexa_client::{ApiClient, AuthGuard, ClientConfig, FileSessionStore};
//!
//! let config = ClientConfig::from_env();
//! let guard = Arc::new(AuthGuard::new(FileSessionStore::in_dir(&config.session_dir)));
//! guard.restore();
//!
//! let client = ApiClient::new(&config, guard)?;
//! client.login("kamil", "123456").await?;
//! let history = client.queries(0, 20).await?;
//! ```

mod client;
mod config;
mod error;
mod guard;
pub mod paths;
mod session;
mod types;

pub use client::ApiClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ClientError, StorageError};
pub use guard::{AuthGuard, SessionState};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
pub use types::{
    AccessGrant, AccessLevel, Ack, BaseModel, Credentials, DatasetType, DatasetValidation,
    FileAction, FineTuneRequest, GeneratedFile, HealthReport, LlmModel, LogEntry, ModelAccess,
    ModelStatistics, ModelUpdate, QueryRecord, QueryResponse, Registration, ResourceId,
    ResourceStatus, SearchKind, SearchResult, TrackedResource, TrainingDataset, TrainingParams,
    UserProfile, ValidationStatus,
};

/// Default backend URL (the FastAPI service in local development).
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// File name of the persisted session inside the data directory.
pub const SESSION_FILENAME: &str = "session.json";
