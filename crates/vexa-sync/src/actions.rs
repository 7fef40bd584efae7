//! User-initiated actions.
//!
//! Each action catches its own failure and reports it as exactly one
//! notification. An expired session is not reported here: the guard has
//! already signed the user out and the front end reacts to that.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use vexa_client::{
    AccessGrant, ApiClient, ClientError, DatasetType, FileAction, FineTuneRequest, GeneratedFile,
    ModelUpdate, QueryResponse, ResourceId, TrackedResource, TrainingDataset, TrainingParams,
    ValidationStatus,
};

use crate::notifications::NotificationCenter;
use crate::synchronizer::PollingSynchronizer;

/// What happened to a file requested alongside a chat reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    /// The reply requested no file.
    None,
    Saved(PathBuf),
    Failed(String),
}

/// A successful chat exchange and its secondary file step.
#[derive(Debug, Clone)]
pub struct MessageOutcome {
    pub response: QueryResponse,
    pub attachment: AttachmentOutcome,
}

/// Runs actions against the backend and reports their outcome.
#[derive(Clone)]
pub struct ActionRunner {
    client: ApiClient,
    notifications: NotificationCenter,
    downloads: PathBuf,
}

impl ActionRunner {
    pub fn new(
        client: ApiClient,
        notifications: NotificationCenter,
        downloads: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            notifications,
            downloads: downloads.into(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Send a chat message. A file requested by the reply is generated and
    /// saved afterwards; its failure is reported on its own and does not
    /// affect the returned reply.
    pub async fn send_message(
        &self,
        text: &str,
        context: Option<&str>,
        fine_tuned_model: Option<&ResourceId>,
    ) -> Option<MessageOutcome> {
        let response = self
            .settle("send message", self.client.ask(text, context, fine_tuned_model).await)?;

        let attachment = match response.file_action.as_ref() {
            Some(action) if action.is_generate_csv() => self.save_attachment(action).await,
            Some(action) => {
                debug!("Ignoring unsupported file action '{}'", action.action);
                AttachmentOutcome::None
            }
            None => AttachmentOutcome::None,
        };

        Some(MessageOutcome {
            response,
            attachment,
        })
    }

    pub async fn create_model(&self, request: &FineTuneRequest) -> Option<TrackedResource> {
        let model = self.settle(
            "create model",
            self.client.create_fine_tuned_model(request).await,
        )?;
        self.notifications
            .success(format!("Model {} created", model.label()));
        Some(model)
    }

    /// Start training and watch the model until it reaches a terminal
    /// status.
    pub async fn start_training(
        &self,
        sync: &PollingSynchronizer,
        id: &ResourceId,
        params: &TrainingParams,
    ) -> bool {
        let started = self.settle(
            "start training",
            self.client.start_training(id, params).await,
        );
        if started.is_none() {
            return false;
        }
        sync.track(id.clone());
        self.notifications
            .info(format!("Training of model {} started", id));
        true
    }

    pub async fn stop_training(&self, id: &ResourceId) -> bool {
        let stopped = self.settle("stop training", self.client.stop_training(id).await);
        if stopped.is_some() {
            self.notifications
                .info(format!("Stopping training of model {}", id));
        }
        stopped.is_some()
    }

    pub async fn delete_model(&self, sync: &PollingSynchronizer, id: &ResourceId) -> bool {
        let deleted = self.settle(
            "delete model",
            self.client.delete_fine_tuned_model(id).await,
        );
        if deleted.is_none() {
            return false;
        }
        sync.untrack(id);
        self.notifications.success(format!("Model {} deleted", id));
        true
    }

    pub async fn update_model(
        &self,
        id: &ResourceId,
        update: &ModelUpdate,
    ) -> Option<TrackedResource> {
        let model = self.settle(
            "update model",
            self.client.update_fine_tuned_model(id, update).await,
        )?;
        self.notifications
            .success(format!("Model {} updated", model.label()));
        Some(model)
    }

    /// Upload a training file for a model. A dataset the backend rejects is
    /// still returned, with a warning instead of a success.
    pub async fn upload_dataset(
        &self,
        id: &ResourceId,
        file: &Path,
        dataset_type: DatasetType,
        description: Option<&str>,
    ) -> Option<TrainingDataset> {
        let Some(filename) = file.file_name().and_then(|name| name.to_str()) else {
            self.notifications
                .warning(format!("Invalid dataset path: {}", file.display()));
            return None;
        };
        let bytes = match tokio::fs::read(file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not read {}: {}", file.display(), e);
                self.notifications
                    .error(format!("Could not read {}: {}", file.display(), e));
                return None;
            }
        };

        let dataset = self.settle(
            "upload dataset",
            self.client
                .upload_dataset(id, filename, bytes, dataset_type, description)
                .await,
        )?;
        match dataset.validation_status {
            ValidationStatus::Valid => self
                .notifications
                .success(format!("Dataset {} is ready for training", dataset.filename)),
            _ => self
                .notifications
                .warning(format!("Dataset {} did not pass validation", dataset.filename)),
        };
        Some(dataset)
    }

    pub async fn grant_access(&self, id: &ResourceId, grant: &AccessGrant) -> bool {
        let granted = self.settle("grant access", self.client.grant_access(id, grant).await);
        if granted.is_some() {
            self.notifications.success(format!(
                "User {} can now {} model {}",
                grant.user_id, grant.access_level, id
            ));
        }
        granted.is_some()
    }

    pub async fn revoke_access(&self, id: &ResourceId, user_id: i64) -> bool {
        let revoked = self.settle(
            "revoke access",
            self.client.revoke_access(id, user_id).await,
        );
        if let Some(ack) = &revoked {
            self.notifications.info(
                ack.message
                    .clone()
                    .unwrap_or_else(|| format!("Access of user {} revoked", user_id)),
            );
        }
        revoked.is_some()
    }

    pub async fn delete_query(&self, id: i64) -> bool {
        let deleted = self.settle("delete query", self.client.delete_query(id).await);
        if deleted.is_some() {
            self.notifications.success("Query deleted");
        }
        deleted.is_some()
    }

    pub async fn switch_model(&self, name: &str) -> bool {
        let switched = self.settle("switch model", self.client.switch_model(name).await);
        if switched.is_some() {
            self.notifications
                .success(format!("Switched to {}", name.trim()));
        }
        switched.is_some()
    }

    async fn save_attachment(&self, action: &FileAction) -> AttachmentOutcome {
        let file = match self.client.generate_csv(action).await {
            Ok(file) => file,
            Err(e) => {
                let message = e.to_string();
                self.report("generate file", e);
                return AttachmentOutcome::Failed(message);
            }
        };

        match write_download(&self.downloads, &file).await {
            Ok(path) => {
                info!("Saved {}", path.display());
                self.notifications
                    .success(format!("Saved {}", file.filename));
                AttachmentOutcome::Saved(path)
            }
            Err(e) => {
                warn!("Could not save {}: {}", file.filename, e);
                let message = format!("Could not save {}: {}", file.filename, e);
                self.notifications.error(message.clone());
                AttachmentOutcome::Failed(message)
            }
        }
    }

    fn settle<T>(&self, action: &str, result: Result<T, ClientError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.report(action, e);
                None
            }
        }
    }

    fn report(&self, action: &str, error: ClientError) {
        match error {
            ClientError::AuthExpired => {
                info!("{} abandoned: session expired", action);
            }
            ClientError::NotAuthenticated => {
                self.notifications
                    .warning(format!("Log in to {}", action));
            }
            ClientError::Validation(message) => {
                self.notifications.warning(message);
            }
            ClientError::Request { message, .. } => {
                warn!("{} failed: {}", action, message);
                self.notifications
                    .error(format!("Could not {}: {}", action, message));
            }
            other => {
                warn!("{} failed: {}", action, other);
                self.notifications
                    .error(format!("Could not {}: {}", action, other));
            }
        }
    }
}

/// Write into `dir`, keeping only the file name part of the backend's
/// suggestion.
async fn write_download(dir: &Path, file: &GeneratedFile) -> std::io::Result<PathBuf> {
    let name = Path::new(&file.filename)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("generated_data.csv"));
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, &file.bytes).await?;
    Ok(path)
}
