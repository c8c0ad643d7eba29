//! Persistence of test cases and identities.
//!
//! The batch coordinator only needs three operations, captured by the
//! [`Datastore`] trait. [`JsonDatastore`] keeps everything in one JSON
//! document, either in memory or backed by a file that is rewritten after
//! every update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use super::types::ItemStatus;

/// Error types for datastore access
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid datastore document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Test case {0} not found")]
    CaseNotFound(String),
}

/// A user the agent logs in as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// A stored test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    #[serde(alias = "user_id")]
    pub identity_id: String,
    /// Ordered natural-language actions performed after login
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, rename = "gif_url", skip_serializing_if = "Option::is_none")]
    pub gif_ref: Option<String>,
    #[serde(default, rename = "pdf_url", skip_serializing_if = "Option::is_none")]
    pub pdf_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Fields written back to a case after its run
#[derive(Debug, Clone, PartialEq)]
pub struct CaseUpdate {
    pub status: ItemStatus,
    pub gif_ref: Option<String>,
    pub pdf_ref: Option<String>,
    pub last_run_at: DateTime<Utc>,
}

/// Read and update access to cases and identities
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn get_case(&self, id: &str) -> Result<Option<TestCase>, StoreError>;

    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, StoreError>;

    async fn update_case_status(&self, id: &str, update: CaseUpdate) -> Result<(), StoreError>;
}

/// On-disk layout of a [`JsonDatastore`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default, alias = "users")]
    pub identities: Vec<Identity>,
    #[serde(default, alias = "test_cases")]
    pub cases: Vec<TestCase>,
}

/// Datastore holding a single JSON document
#[derive(Debug)]
pub struct JsonDatastore {
    path: Option<PathBuf>,
    data: Mutex<StoreData>,
}

impl JsonDatastore {
    /// Load the document at `path`; updates are written back to it
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = serde_json::from_slice(&std::fs::read(&path)?)?;
        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    /// A datastore that never touches the filesystem
    pub fn in_memory(data: StoreData) -> Self {
        Self {
            path: None,
            data: Mutex::new(data),
        }
    }

    /// Copy of the current document
    pub async fn snapshot(&self) -> StoreData {
        self.data.lock().await.clone()
    }

    async fn persist(path: &Path, data: &StoreData) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl Datastore for JsonDatastore {
    async fn get_case(&self, id: &str) -> Result<Option<TestCase>, StoreError> {
        let data = self.data.lock().await;
        Ok(data.cases.iter().find(|c| c.id == id).cloned())
    }

    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        let data = self.data.lock().await;
        Ok(data.identities.iter().find(|i| i.id == id).cloned())
    }

    async fn update_case_status(&self, id: &str, update: CaseUpdate) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;
        let case = data
            .cases
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::CaseNotFound(id.to_string()))?;
        case.status = Some(update.status.to_string());
        case.gif_ref = update.gif_ref;
        case.pdf_ref = update.pdf_ref;
        case.last_run_at = Some(update.last_run_at);
        debug!(case_id = id, status = %update.status, "case updated");

        if let Some(path) = &self.path {
            Self::persist(path, &data).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn data() -> StoreData {
        StoreData {
            identities: vec![Identity {
                id: "u1".to_string(),
                name: "Student".to_string(),
                email: "student@example.com".to_string(),
            }],
            cases: vec![TestCase {
                id: "c1".to_string(),
                title: "Open courses".to_string(),
                identity_id: "u1".to_string(),
                actions: vec!["Open the Courses tab".to_string()],
                status: None,
                gif_ref: None,
                pdf_ref: None,
                last_run_at: None,
            }],
        }
    }

    fn update() -> CaseUpdate {
        CaseUpdate {
            status: ItemStatus::Passed,
            gif_ref: Some("/static/runs/r/timelapse.gif".to_string()),
            pdf_ref: None,
            last_run_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_lookup() {
        let store = JsonDatastore::in_memory(data());
        assert_eq!(store.get_case("c1").await.unwrap().unwrap().title, "Open courses");
        assert!(store.get_case("nope").await.unwrap().is_none());
        assert_eq!(
            store.get_identity("u1").await.unwrap().unwrap().email,
            "student@example.com"
        );
        assert!(store.get_identity("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_case() {
        let store = JsonDatastore::in_memory(data());
        let err = store.update_case_status("nope", update()).await.unwrap_err();
        assert!(matches!(err, StoreError::CaseNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_update_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, serde_json::to_vec(&data()).unwrap()).unwrap();

        let store = JsonDatastore::open(&path).unwrap();
        store.update_case_status("c1", update()).await.unwrap();

        let reopened = JsonDatastore::open(&path).unwrap();
        let case = reopened.get_case("c1").await.unwrap().unwrap();
        assert_eq!(case.status.as_deref(), Some("passed"));
        assert_eq!(case.gif_ref.as_deref(), Some("/static/runs/r/timelapse.gif"));
        assert!(case.last_run_at.is_some());
        assert!(!dir.path().join("store.json.tmp").exists());
    }

    #[test]
    fn test_legacy_field_names() {
        let json = r#"{
            "users": [{"id": "u1", "name": "A", "email": "a@example.com"}],
            "test_cases": [{"id": "c1", "title": "T", "user_id": "u1"}]
        }"#;
        let data: StoreData = serde_json::from_str(json).unwrap();
        assert_eq!(data.identities.len(), 1);
        assert_eq!(data.cases[0].identity_id, "u1");
        assert!(data.cases[0].actions.is_empty());
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(JsonDatastore::open(&path), Err(StoreError::Json(_))));
    }
}
