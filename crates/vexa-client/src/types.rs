//! Wire types for the backend API.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;

/// Opaque identifier of a server-owned resource.
///
/// The backend sends integers; the client never does arithmetic on them.
/// Comparison uses the text only, so `7` and `"7"` name the same resource,
/// but serialization keeps the JSON kind the id arrived with.
#[derive(Debug, Clone)]
pub struct ResourceId {
    text: SmolStr,
    numeric: bool,
}

impl ResourceId {
    /// An id typed by a user. Canonical integers are sent as numbers.
    pub fn new(id: impl AsRef<str>) -> Self {
        let text = SmolStr::new(id.as_ref());
        let numeric = is_canonical_integer(&text);
        Self { text, numeric }
    }

    /// An id the backend sent as a JSON string.
    pub fn text(id: impl AsRef<str>) -> Self {
        Self {
            text: SmolStr::new(id.as_ref()),
            numeric: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

fn is_canonical_integer(text: &str) -> bool {
    text.parse::<i64>()
        .map(|n| n.to_string() == text)
        .unwrap_or(false)
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        Self {
            text: SmolStr::new(id.to_string()),
            numeric: true,
        }
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.text.parse::<i64>() {
            Ok(n) if self.numeric => serializer.serialize_i64(n),
            _ => serializer.serialize_str(&self.text),
        }
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => ResourceId::from(n),
            Raw::Str(s) => ResourceId::text(s),
        })
    }
}

/// Lifecycle status of a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Pending,
    #[serde(alias = "training")]
    Running,
    Completed,
    Failed,
    Stopped,
}

impl ResourceStatus {
    /// No further transition is expected from a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResourceStatus::Completed | ResourceStatus::Failed | ResourceStatus::Stopped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceStatus::Pending => "pending",
            ResourceStatus::Running => "running",
            ResourceStatus::Completed => "completed",
            ResourceStatus::Failed => "failed",
            ResourceStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A server-owned entity whose lifecycle the client observes (a fine-tuning
/// job). Accepts both the list shape (`training_status`) and the status
/// endpoint shape (`model_id`, `status`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedResource {
    #[serde(alias = "model_id")]
    pub id: ResourceId,
    #[serde(alias = "training_status")]
    pub status: ResourceStatus,
    #[serde(
        default,
        alias = "training_progress",
        deserialize_with = "deserialize_progress"
    )]
    pub progress: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub base_model: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub model_size: Option<u64>,
}

impl TrackedResource {
    pub fn new(id: impl Into<ResourceId>, status: ResourceStatus) -> Self {
        Self {
            id: id.into(),
            status,
            progress: 0,
            name: None,
            specialization: None,
            base_model: None,
            description: None,
            completed_at: None,
            model_size: None,
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = progress.min(100);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name, falling back to the identifier.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("model {}", self.id),
        }
    }
}

fn deserialize_progress<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.map(|p| p.clamp(0.0, 100.0).round() as u8).unwrap_or(0))
}

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Login body.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Registration body.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub token_type: Option<String>,
    pub user: UserProfile,
}

/// Generic acknowledgement (`{"message": "..."}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    pub query_text: &'a str,
    pub context: Option<&'a str>,
}

/// Side effect requested by the assistant alongside a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAction {
    pub action: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl FileAction {
    pub const GENERATE_CSV: &'static str = "generate_csv";

    pub fn is_generate_csv(&self) -> bool {
        self.action == Self::GENERATE_CSV
    }
}

/// Reply to a chat query.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub id: i64,
    pub query_text: String,
    pub response_text: String,
    #[serde(default)]
    pub context: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub file_action: Option<FileAction>,
    #[serde(default)]
    pub model_used: Option<String>,
}

/// One entry of the query history.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRecord {
    pub id: i64,
    pub query_text: String,
    #[serde(default)]
    pub response_text: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryPage {
    pub queries: Vec<QueryRecord>,
}

/// An LLM installed on the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmModel {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelList {
    pub models: Vec<LlmModel>,
}

/// A base model that can be fine-tuned.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseModel {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub specializations: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BaseModelList {
    pub models: BTreeMap<String, BaseModel>,
}

/// Body for creating a fine-tuned model.
#[derive(Debug, Clone, Serialize)]
pub struct FineTuneRequest {
    pub model_name: String,
    pub base_model: String,
    pub specialization: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Optional overrides for a training run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epochs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
}

/// Partial update of a fine-tuned model; unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
}

impl ModelUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
            && self.specialization.is_none()
    }
}

/// Dataset formats accepted for training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    Jsonl,
    Csv,
    Pdf,
    Txt,
}

impl DatasetType {
    pub const ALL: [DatasetType; 4] = [
        DatasetType::Jsonl,
        DatasetType::Csv,
        DatasetType::Pdf,
        DatasetType::Txt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetType::Jsonl => "jsonl",
            DatasetType::Csv => "csv",
            DatasetType::Pdf => "pdf",
            DatasetType::Txt => "txt",
        }
    }

    /// Type implied by a file extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the backend's dataset check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Pending,
    Valid,
    Invalid,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::Valid => "valid",
            ValidationStatus::Invalid => "invalid",
        }
    }
}

/// A file uploaded to train a fine-tuned model.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingDataset {
    pub id: ResourceId,
    pub model_id: ResourceId,
    pub filename: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    pub dataset_type: String,
    pub validation_status: ValidationStatus,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub validation_errors: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

/// Result of validating a dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetValidation {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub column_info: serde_json::Value,
}

/// Permission granted on a fine-tuned model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Admin => "admin",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body for granting another user access to a model.
#[derive(Debug, Clone, Serialize)]
pub struct AccessGrant {
    pub user_id: i64,
    pub access_level: AccessLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

/// One user's access to a model.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelAccess {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub access_level: String,
    #[serde(default)]
    pub access_type: Option<String>,
    #[serde(default)]
    pub granted_at: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Usage summary of one fine-tuned model.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelStatistics {
    pub model_id: ResourceId,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(alias = "training_status")]
    pub status: ResourceStatus,
    #[serde(default)]
    pub model_size_bytes: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub total_queries: u64,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub base_model: Option<String>,
}

/// A training log line.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(alias = "level")]
    pub log_level: String,
    pub message: String,
    #[serde(default)]
    pub step: Option<u32>,
    #[serde(default)]
    pub epoch: Option<u32>,
    #[serde(default)]
    pub loss: Option<String>,
    #[serde(default)]
    pub accuracy: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Backend health summary.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub services: BTreeMap<String, String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }

    /// Services not reporting `online`.
    pub fn degraded_services(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|(_, state)| state.as_str() != "online")
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CsvRequest<'a> {
    pub description: &'a str,
    pub filename: &'a str,
}

/// A file produced by the backend.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Kind of web search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    General,
    Weather,
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub query: &'a str,
    #[serde(rename = "type")]
    pub kind: SearchKind,
}

/// Web search result; `data` is backend-defined.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
}
