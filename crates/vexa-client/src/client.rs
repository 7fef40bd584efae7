//! HTTP client for the assistant backend.

use std::sync::Arc;

use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{self, ClientError};
use crate::guard::AuthGuard;
use crate::session::Session;
use crate::types::{
    AccessGrant, Ack, BaseModel, BaseModelList, Credentials, CsvRequest, DatasetType,
    DatasetValidation, FileAction, FineTuneRequest, GeneratedFile, HealthReport, LlmModel,
    LogEntry, LoginResponse, ModelAccess, ModelList, ModelStatistics, ModelUpdate, QueryPage,
    QueryRecord, QueryRequest, QueryResponse, Registration, ResourceId, SearchKind,
    SearchRequest, SearchResult, TrackedResource, TrainingDataset, TrainingParams, UserProfile,
};

/// Whether a call needs a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// Fails fast without a session; 401/403 signs the process out.
    Required,
    /// Token attached when present; rejections are ordinary errors.
    Optional,
}

/// Client for the assistant backend.
///
/// Reads the bearer token from the shared [`AuthGuard`] on every call and
/// reports credential rejection back to it.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    guard: Arc<AuthGuard>,
}

impl ApiClient {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig, guard: Arc<AuthGuard>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Self::with_http(http, &config.base_url, guard)
    }

    /// Create a client for `base_url` with default HTTP settings.
    pub fn with_url(base_url: &str, guard: Arc<AuthGuard>) -> Result<Self, ClientError> {
        Self::with_http(reqwest::Client::new(), base_url, guard)
    }

    fn with_http(
        http: reqwest::Client,
        base_url: &str,
        guard: Arc<AuthGuard>,
    ) -> Result<Self, ClientError> {
        let base = Url::parse(base_url)
            .map_err(|e| ClientError::validation(format!("invalid API URL '{}': {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::validation(format!(
                "invalid API URL '{}'",
                base_url
            )));
        }
        Ok(Self { http, base, guard })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// The session guard this client reports to.
    pub fn guard(&self) -> &Arc<AuthGuard> {
        &self.guard
    }

    // ------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------

    /// Exchange credentials for a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile, ClientError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::validation("username is required"));
        }
        if password.is_empty() {
            return Err(ClientError::validation("password is required"));
        }

        self.guard.begin_login();

        let body = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let request = self.http.post(self.endpoint(&["auth", "login"])).json(&body);

        match self.send_json::<LoginResponse>(request, Auth::Optional).await {
            Ok(response) => {
                let user = response.user.clone();
                self.guard
                    .complete_login(Session::new(response.access_token, response.user));
                Ok(user)
            }
            Err(e) => {
                self.guard.abort_login();
                Err(e)
            }
        }
    }

    /// Create an account. Does not sign in.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<UserProfile, ClientError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::validation("username is required"));
        }
        if password.is_empty() {
            return Err(ClientError::validation("password is required"));
        }
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        if let Some(email) = email {
            if !email.contains('@') {
                return Err(ClientError::validation(format!(
                    "'{}' is not an email address",
                    email
                )));
            }
        }

        let body = Registration {
            username: username.to_string(),
            password: password.to_string(),
            email: email.map(str::to_string),
        };
        let request = self
            .http
            .post(self.endpoint(&["auth", "register"]))
            .json(&body);
        self.send_json(request, Auth::Optional).await
    }

    /// End the session. The backend keeps no server-side session state.
    pub fn logout(&self) {
        self.guard.logout();
    }

    // ------------------------------------------------------------------
    // Chat and history
    // ------------------------------------------------------------------

    /// Send a chat query, optionally routed to a fine-tuned model.
    pub async fn ask(
        &self,
        query_text: &str,
        context: Option<&str>,
        fine_tuned_model: Option<&ResourceId>,
    ) -> Result<QueryResponse, ClientError> {
        if query_text.trim().is_empty() {
            return Err(ClientError::validation("message is empty"));
        }

        let mut url = self.endpoint(&["query"]);
        if let Some(model) = fine_tuned_model {
            url.query_pairs_mut()
                .append_pair("fine_tuned_model_id", model.as_str());
        }
        let body = QueryRequest {
            query_text,
            context,
        };
        self.send_json(self.http.post(url).json(&body), Auth::Required)
            .await
    }

    /// Page through the query history.
    pub async fn queries(&self, skip: u32, limit: u32) -> Result<Vec<QueryRecord>, ClientError> {
        let request = self
            .http
            .get(self.endpoint(&["queries"]))
            .query(&[("skip", skip), ("limit", limit)]);
        let page: QueryPage = self.send_json(request, Auth::Required).await?;
        Ok(page.queries)
    }

    pub async fn delete_query(&self, id: i64) -> Result<Ack, ClientError> {
        let id = id.to_string();
        let request = self.http.delete(self.endpoint(&["queries", id.as_str()]));
        self.send_json(request, Auth::Required).await
    }

    // ------------------------------------------------------------------
    // LLM models
    // ------------------------------------------------------------------

    /// Models installed on the backend.
    pub async fn models(&self) -> Result<Vec<LlmModel>, ClientError> {
        let request = self.http.get(self.endpoint(&["models"]));
        let list: ModelList = self.send_json(request, Auth::Optional).await?;
        Ok(list.models)
    }

    pub async fn switch_model(&self, name: &str) -> Result<Ack, ClientError> {
        if name.trim().is_empty() {
            return Err(ClientError::validation("model name is required"));
        }
        let request = self
            .http
            .post(self.endpoint(&["models", "switch", name.trim()]));
        self.send_json(request, Auth::Required).await
    }

    // ------------------------------------------------------------------
    // Fine-tuned models
    // ------------------------------------------------------------------

    /// Fine-tuned models visible to the user.
    pub async fn fine_tuned_models(
        &self,
        specialization: Option<&str>,
    ) -> Result<Vec<TrackedResource>, ClientError> {
        let mut request = self.http.get(self.endpoint(&["fine-tuned-models"]));
        if let Some(spec) = specialization {
            request = request.query(&[("specialization", spec)]);
        }
        self.send_json(request, Auth::Required).await
    }

    pub async fn fine_tuned_model(&self, id: &ResourceId) -> Result<TrackedResource, ClientError> {
        let request = self
            .http
            .get(self.endpoint(&["fine-tuned-models", id.as_str()]));
        self.send_json(request, Auth::Required).await
    }

    pub async fn create_fine_tuned_model(
        &self,
        request: &FineTuneRequest,
    ) -> Result<TrackedResource, ClientError> {
        if request.model_name.trim().is_empty() {
            return Err(ClientError::validation("model name is required"));
        }
        if request.base_model.trim().is_empty() {
            return Err(ClientError::validation("base model is required"));
        }
        if request.specialization.trim().is_empty() {
            return Err(ClientError::validation("specialization is required"));
        }

        let builder = self
            .http
            .post(self.endpoint(&["fine-tuned-models"]))
            .json(request);
        self.send_json(builder, Auth::Required).await
    }

    /// Change name, description, specialization or active flag.
    pub async fn update_fine_tuned_model(
        &self,
        id: &ResourceId,
        update: &ModelUpdate,
    ) -> Result<TrackedResource, ClientError> {
        if update.is_empty() {
            return Err(ClientError::validation("nothing to update"));
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ClientError::validation("model name cannot be empty"));
        }

        let request = self
            .http
            .put(self.endpoint(&["fine-tuned-models", id.as_str()]))
            .json(update);
        self.send_json(request, Auth::Required).await
    }

    pub async fn delete_fine_tuned_model(&self, id: &ResourceId) -> Result<Ack, ClientError> {
        let request = self
            .http
            .delete(self.endpoint(&["fine-tuned-models", id.as_str()]));
        self.send_json(request, Auth::Required).await
    }

    pub async fn start_training(
        &self,
        id: &ResourceId,
        params: &TrainingParams,
    ) -> Result<Ack, ClientError> {
        let request = self
            .http
            .post(self.endpoint(&["fine-tuned-models", id.as_str(), "start-training"]))
            .json(params);
        self.send_json(request, Auth::Required).await
    }

    pub async fn stop_training(&self, id: &ResourceId) -> Result<Ack, ClientError> {
        let request = self
            .http
            .post(self.endpoint(&["fine-tuned-models", id.as_str(), "stop-training"]));
        self.send_json(request, Auth::Required).await
    }

    /// Current training status of one model.
    pub async fn training_status(&self, id: &ResourceId) -> Result<TrackedResource, ClientError> {
        let request = self
            .http
            .get(self.endpoint(&["fine-tuned-models", id.as_str(), "status"]));
        self.send_json(request, Auth::Required).await
    }

    /// Most recent training log lines, newest first.
    pub async fn training_logs(
        &self,
        id: &ResourceId,
        limit: u32,
        log_level: Option<&str>,
    ) -> Result<Vec<LogEntry>, ClientError> {
        let mut request = self
            .http
            .get(self.endpoint(&["fine-tuned-models", id.as_str(), "logs"]))
            .query(&[("limit", limit)]);
        if let Some(level) = log_level {
            request = request.query(&[("log_level", level)]);
        }
        self.send_json(request, Auth::Required).await
    }

    /// Usage summary of one model.
    pub async fn model_statistics(&self, id: &ResourceId) -> Result<ModelStatistics, ClientError> {
        let request = self
            .http
            .get(self.endpoint(&["fine-tuned-models", id.as_str(), "statistics"]));
        self.send_json(request, Auth::Required).await
    }

    // ------------------------------------------------------------------
    // Training datasets
    // ------------------------------------------------------------------

    /// Upload a training file. The backend validates it on arrival; check
    /// [`TrainingDataset::validation_status`].
    pub async fn upload_dataset(
        &self,
        id: &ResourceId,
        filename: &str,
        bytes: Vec<u8>,
        dataset_type: DatasetType,
        description: Option<&str>,
    ) -> Result<TrainingDataset, ClientError> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(ClientError::validation("dataset file name is required"));
        }
        if bytes.is_empty() {
            return Err(ClientError::validation(format!(
                "dataset '{}' is empty",
                filename
            )));
        }

        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self
            .http
            .post(self.endpoint(&["fine-tuned-models", id.as_str(), "datasets"]))
            .query(&[
                ("dataset_type", dataset_type.as_str()),
                ("description", description.unwrap_or("")),
            ])
            .multipart(form);
        self.send_json(request, Auth::Required).await
    }

    /// Datasets uploaded for a model.
    pub async fn datasets(&self, id: &ResourceId) -> Result<Vec<TrainingDataset>, ClientError> {
        let request = self
            .http
            .get(self.endpoint(&["fine-tuned-models", id.as_str(), "datasets"]));
        self.send_json(request, Auth::Required).await
    }

    /// Re-run validation of an uploaded dataset.
    pub async fn validate_dataset(
        &self,
        dataset_id: &ResourceId,
    ) -> Result<DatasetValidation, ClientError> {
        let request = self
            .http
            .post(self.endpoint(&["datasets", dataset_id.as_str(), "validate"]));
        self.send_json(request, Auth::Required).await
    }

    // ------------------------------------------------------------------
    // Model sharing
    // ------------------------------------------------------------------

    pub async fn grant_access(
        &self,
        id: &ResourceId,
        grant: &AccessGrant,
    ) -> Result<(), ClientError> {
        let request = self
            .http
            .post(self.endpoint(&["fine-tuned-models", id.as_str(), "access"]))
            .json(grant);
        self.execute(request, Auth::Required).await?;
        Ok(())
    }

    pub async fn revoke_access(&self, id: &ResourceId, user_id: i64) -> Result<Ack, ClientError> {
        let user = user_id.to_string();
        let request = self.http.delete(self.endpoint(&[
            "fine-tuned-models",
            id.as_str(),
            "access",
            user.as_str(),
        ]));
        self.send_json(request, Auth::Required).await
    }

    /// Users who can use a model.
    pub async fn access_list(&self, id: &ResourceId) -> Result<Vec<ModelAccess>, ClientError> {
        let request = self
            .http
            .get(self.endpoint(&["fine-tuned-models", id.as_str(), "access"]));
        self.send_json(request, Auth::Required).await
    }

    /// Base models available for fine-tuning, keyed by model path.
    pub async fn base_models(&self) -> Result<Vec<(String, BaseModel)>, ClientError> {
        let request = self.http.get(self.endpoint(&["base-models"]));
        let list: BaseModelList = self.send_json(request, Auth::Optional).await?;
        Ok(list.models.into_iter().collect())
    }

    // ------------------------------------------------------------------
    // Tools
    // ------------------------------------------------------------------

    /// Backend health. Does not require a session.
    pub async fn health(&self) -> Result<HealthReport, ClientError> {
        let request = self.http.get(self.endpoint(&["health"]));
        self.send_json(request, Auth::Optional).await
    }

    /// Render a file requested by a chat reply.
    pub async fn generate_csv(&self, action: &FileAction) -> Result<GeneratedFile, ClientError> {
        if !action.is_generate_csv() {
            return Err(ClientError::validation(format!(
                "unsupported file action '{}'",
                action.action
            )));
        }
        let filename = action
            .filename
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or("generated_data.csv");
        let body = CsvRequest {
            description: action.description.as_deref().unwrap_or(""),
            filename,
        };

        let request = self
            .http
            .post(self.endpoint(&["files", "generate-csv"]))
            .json(&body);
        let response = self.execute(request, Auth::Required).await?;
        let bytes = response.bytes().await?;

        Ok(GeneratedFile {
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
        })
    }

    pub async fn search_web(
        &self,
        query: &str,
        kind: SearchKind,
    ) -> Result<SearchResult, ClientError> {
        if query.trim().is_empty() {
            return Err(ClientError::validation("search query is empty"));
        }
        let request = self
            .http
            .post(self.endpoint(&["search", "web"]))
            .json(&SearchRequest { query, kind });
        self.send_json(request, Auth::Required).await
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // checked in the constructor
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Attach the credential, send, and map failure statuses.
    async fn execute(&self, request: RequestBuilder, auth: Auth) -> Result<Response, ClientError> {
        let token = self.guard.token();
        let request = match (&token, auth) {
            (Some(token), _) => request.bearer_auth(token),
            (None, Auth::Required) => return Err(ClientError::NotAuthenticated),
            (None, Auth::Optional) => request,
        };

        let response = request.send().await?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url().path());

        if status.is_success() {
            return Ok(response);
        }

        if auth == Auth::Required
            && matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        {
            if let Some(token) = &token {
                self.guard.expire_token(token);
            }
            return Err(ClientError::AuthExpired);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error::message_from_body(status, &body);
        warn!("Request failed with {}: {}", status, message);
        Err(ClientError::Request {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        auth: Auth,
    ) -> Result<T, ClientError> {
        let response = self.execute(request, auth).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    fn client(url: &str) -> Result<ApiClient, ClientError> {
        ApiClient::with_url(url, Arc::new(AuthGuard::new(MemorySessionStore::new())))
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = client("http://127.0.0.1:8000").unwrap();
        let url = client.endpoint(&["fine-tuned-models", "7", "status"]);
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/fine-tuned-models/7/status");
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_escapes() {
        let client = client("http://gateway.local/api/").unwrap();
        let url = client.endpoint(&["models", "switch", "llama3/8b"]);
        assert_eq!(url.as_str(), "http://gateway.local/api/models/switch/llama3%2F8b");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(client("not a url"), Err(ClientError::Validation(_))));
        assert!(matches!(client("mailto:someone@example.com"), Err(ClientError::Validation(_))));
    }
}
