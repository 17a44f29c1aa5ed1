//! Project store: the durable home of each project's document.
//!
//! [`ProjectStore`] is the seam. [`HttpProjectStore`] speaks the project
//! REST API; [`MemoryProjectStore`] keeps records in process for tests and
//! for hosts that embed the sync runtime without an API. A relay started
//! without `PROJECTS_API_URL` has no store at all and starts every channel
//! empty.
//!
//! ERROR HANDLING
//! ==============
//! Transport, status, and decode failures map to [`StoreError`] variants.
//! Nothing here retries; callers surface the failure and move on.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use canvas::doc::{CanvasElement, validate_snapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// TYPES
// =============================================================================

/// Errors produced by project store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No project with this id.
    #[error("project not found: {0}")]
    NotFound(String),

    /// The request never produced a response.
    #[error("store request failed: {0}")]
    Request(String),

    /// The store answered with a non-success status.
    #[error("store returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("store response parse failed: {0}")]
    Parse(String),

    /// The HTTP client could not be constructed.
    #[error("http client build failed: {0}")]
    ClientBuild(String),
}

/// One stored project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner_uid: String,
    /// The document's element list, stored as-is.
    #[serde(default)]
    pub data: Vec<CanvasElement>,
}

/// Durable project storage. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    /// Create a project owned by `uid` and return its id.
    async fn create(&self, uid: &str, name: &str, data: &[CanvasElement]) -> Result<String, StoreError>;

    /// Fetch a project's document.
    async fn get(&self, id: &str) -> Result<Vec<CanvasElement>, StoreError>;

    /// List the projects owned by `uid`.
    async fn list(&self, uid: &str) -> Result<Vec<ProjectRecord>, StoreError>;

    /// Overwrite a project's document.
    async fn update(&self, id: &str, data: &[CanvasElement]) -> Result<(), StoreError>;

    /// Delete a project.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

// =============================================================================
// HTTP
// =============================================================================

/// Client for the project REST API rooted at `base_url`.
pub struct HttpProjectStore {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    uid: &'a str,
    name: &'a str,
    data: &'a [CanvasElement],
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    data: &'a [CanvasElement],
}

#[derive(Deserialize)]
struct CreateResponse {
    id: String,
}

#[derive(Deserialize)]
struct GetResponse {
    data: Vec<CanvasElement>,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    projects: Vec<ProjectRecord>,
}

impl HttpProjectStore {
    /// Build a client for `base_url`, e.g. `http://127.0.0.1:3000`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder, id: Option<&str>) -> Result<String, StoreError> {
        let response = request.send().await.map_err(|e| StoreError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| StoreError::Request(e.to_string()))?;
        match (status, id) {
            (200..=299, _) => Ok(body),
            (404, Some(id)) => Err(StoreError::NotFound(id.to_owned())),
            _ => Err(StoreError::Status { status, body }),
        }
    }
}

#[async_trait::async_trait]
impl ProjectStore for HttpProjectStore {
    async fn create(&self, uid: &str, name: &str, data: &[CanvasElement]) -> Result<String, StoreError> {
        let request = self.http.post(self.url("/projects/create")).json(&CreateRequest { uid, name, data });
        let body = self.send(request, None).await?;
        parse_create(&body)
    }

    async fn get(&self, id: &str) -> Result<Vec<CanvasElement>, StoreError> {
        let body = self.send(self.http.get(self.url(&format!("/projects/{id}"))), Some(id)).await?;
        parse_get(&body)
    }

    async fn list(&self, uid: &str) -> Result<Vec<ProjectRecord>, StoreError> {
        let request = self.http.get(self.url("/projects/user")).query(&[("uid", uid)]);
        let body = self.send(request, None).await?;
        parse_list(&body)
    }

    async fn update(&self, id: &str, data: &[CanvasElement]) -> Result<(), StoreError> {
        let request = self.http.put(self.url(&format!("/projects/{id}"))).json(&UpdateRequest { data });
        self.send(request, Some(id)).await.map(|_| ())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.send(self.http.delete(self.url(&format!("/projects/{id}"))), Some(id)).await.map(|_| ())
    }
}

// --- Parsing ---

fn parse_create(body: &str) -> Result<String, StoreError> {
    let parsed: CreateResponse = serde_json::from_str(body).map_err(|e| StoreError::Parse(e.to_string()))?;
    Ok(parsed.id)
}

fn parse_get(body: &str) -> Result<Vec<CanvasElement>, StoreError> {
    let parsed: GetResponse = serde_json::from_str(body).map_err(|e| StoreError::Parse(e.to_string()))?;
    validate_snapshot(&parsed.data).map_err(|e| StoreError::Parse(e.to_string()))?;
    Ok(parsed.data)
}

fn parse_list(body: &str) -> Result<Vec<ProjectRecord>, StoreError> {
    let parsed: ListResponse = serde_json::from_str(body).map_err(|e| StoreError::Parse(e.to_string()))?;
    Ok(parsed.projects)
}

// =============================================================================
// MEMORY
// =============================================================================

/// In-process store. Writes can be made to fail to exercise error paths.
#[derive(Default)]
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<String, ProjectRecord>>,
    next_id: AtomicU64,
    failing: AtomicBool,
}

impl MemoryProjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record.
    pub async fn insert(&self, record: ProjectRecord) {
        self.projects.write().await.insert(record.id.clone(), record);
    }

    /// When set, every write returns [`StoreError::Status`] 503.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Status { status: 503, body: "store unavailable".to_owned() });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn create(&self, uid: &str, name: &str, data: &[CanvasElement]) -> Result<String, StoreError> {
        self.check_writable()?;
        let id = format!("project-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = ProjectRecord { id: id.clone(), name: name.to_owned(), owner_uid: uid.to_owned(), data: data.to_vec() };
        self.insert(record).await;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Vec<CanvasElement>, StoreError> {
        let projects = self.projects.read().await;
        projects.get(id).map(|p| p.data.clone()).ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }

    async fn list(&self, uid: &str) -> Result<Vec<ProjectRecord>, StoreError> {
        let projects = self.projects.read().await;
        let mut owned: Vec<ProjectRecord> = projects.values().filter(|p| p.owner_uid == uid).cloned().collect();
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(owned)
    }

    async fn update(&self, id: &str, data: &[CanvasElement]) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut projects = self.projects.write().await;
        let record = projects.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_owned()))?;
        record.data = data.to_vec();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut projects = self.projects.write().await;
        projects.remove(id).map(|_| ()).ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }
}
