//! Sequential execution of stored test cases.
//!
//! Each case is resolved (case, identity, credential), composed into a task,
//! run, and written back to the datastore. Whatever happens to one case is
//! captured in its [`CaseOutcome`]; the batch always runs to the end.

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::store::{CaseUpdate, Datastore, TestCase};
use super::task::compose_case_task;
use super::types::{BatchItemResult, BatchResult, ItemStatus};
use crate::config::{RunSettings, ScenarioSettings};
use crate::orchestrator::agent::panic_message;
use crate::orchestrator::{RunError, RunOrchestrator, RunResult, artifact_url};

/// Something that turns a task into a finished run
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_task(&self, task: &str) -> Result<RunResult, RunError>;
}

#[async_trait]
impl TaskRunner for RunOrchestrator {
    async fn run_task(&self, task: &str) -> Result<RunResult, RunError> {
        self.run(task).await
    }
}

/// What happened to one case
#[derive(Debug)]
pub enum CaseOutcome {
    /// The case could not be resolved; no run was attempted
    Unresolved { case_id: String, title: String, reason: String },
    /// The run completed and was classified
    Completed {
        case: TestCase,
        status: ItemStatus,
        result: RunResult,
        gif_url: Option<String>,
        pdf_url: Option<String>,
    },
    /// The run itself failed
    Errored { case: TestCase, error: String },
}

impl CaseOutcome {
    pub fn into_item(self) -> BatchItemResult {
        match self {
            CaseOutcome::Unresolved {
                case_id,
                title,
                reason,
            } => BatchItemResult::failed(case_id, title, reason),
            CaseOutcome::Errored { case, error } => BatchItemResult::failed(case.id, case.title, error),
            CaseOutcome::Completed {
                case,
                status,
                result,
                gif_url,
                pdf_url,
            } => BatchItemResult {
                case_id: case.id,
                title: case.title,
                status,
                error: None,
                result: Some(result.text),
                gif_ref: gif_url,
                pdf_ref: pdf_url,
            },
        }
    }
}

/// Runs batches of stored cases one after another
pub struct BatchCoordinator {
    runner: Arc<dyn TaskRunner>,
    store: Arc<dyn Datastore>,
    scenario: ScenarioSettings,
    artifact_root: PathBuf,
    public_prefix: String,
}

impl BatchCoordinator {
    pub fn new(
        runner: Arc<dyn TaskRunner>,
        store: Arc<dyn Datastore>,
        scenario: ScenarioSettings,
        run_settings: &RunSettings,
    ) -> Self {
        Self {
            runner,
            store,
            scenario,
            artifact_root: run_settings.artifact_dir.clone(),
            public_prefix: run_settings.public_prefix.clone(),
        }
    }

    /// Coordinator driving `orchestrator`, publishing URLs under its settings
    pub fn with_orchestrator(
        orchestrator: RunOrchestrator,
        store: Arc<dyn Datastore>,
        scenario: ScenarioSettings,
    ) -> Self {
        let settings = orchestrator.settings().clone();
        Self::new(Arc::new(orchestrator), store, scenario, &settings)
    }

    /// Run every case in `case_ids` in order.
    ///
    /// `credentials` maps case ids to the password of the case's identity.
    /// One case failing never stops the batch.
    #[instrument(skip_all, fields(cases = case_ids.len()))]
    pub async fn run_batch(&self, case_ids: &[String], credentials: &HashMap<String, String>) -> BatchResult {
        let run_id = format!("batch_{}", Utc::now().format("%Y%m%d_%H%M%S"));
        info!(%run_id, "batch started");

        let mut items = Vec::with_capacity(case_ids.len());
        for case_id in case_ids {
            let outcome = self.run_case(case_id, credentials).await;
            items.push(outcome.into_item());
        }

        let batch = BatchResult::from_items(run_id, items, Utc::now());
        info!(
            total = batch.total,
            passed = batch.passed,
            failed = batch.failed,
            success_rate = batch.success_rate,
            "batch finished"
        );
        batch
    }

    #[instrument(skip(self, credentials))]
    async fn run_case(&self, case_id: &str, credentials: &HashMap<String, String>) -> CaseOutcome {
        let unresolved = |title: &str, reason: String| {
            warn!(%reason, "case skipped");
            CaseOutcome::Unresolved {
                case_id: case_id.to_string(),
                title: title.to_string(),
                reason,
            }
        };

        let case = match self.store.get_case(case_id).await {
            Ok(Some(case)) => case,
            Ok(None) => return unresolved("", format!("Test case {} not found", case_id)),
            Err(e) => return unresolved("", format!("Failed to load test case {}: {}", case_id, e)),
        };
        let identity = match self.store.get_identity(&case.identity_id).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                return unresolved(
                    &case.title,
                    format!("Identity {} for test case {} not found", case.identity_id, case_id),
                );
            }
            Err(e) => {
                return unresolved(
                    &case.title,
                    format!("Failed to load identity {}: {}", case.identity_id, e),
                );
            }
        };
        let Some(password) = credentials.get(case_id) else {
            return unresolved(
                &case.title,
                format!("No credential provided for test case {} ({})", case_id, identity.email),
            );
        };

        let task = compose_case_task(&self.scenario, &identity.email, password, &case);
        let run = AssertUnwindSafe(self.runner.run_task(&task)).catch_unwind().await;
        let result = match run {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(error = %e, "run failed");
                return CaseOutcome::Errored {
                    case,
                    error: e.to_string(),
                };
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                error!(%message, "run panicked");
                return CaseOutcome::Errored {
                    case,
                    error: format!("Run panicked: {}", message),
                };
            }
        };

        let status = ItemStatus::from_run_status(result.status.as_str());
        let gif_url = self.public_url(result.gif_ref.as_deref());
        let pdf_url = self.public_url(result.pdf_ref.as_deref());
        let update = CaseUpdate {
            status,
            gif_ref: gif_url.clone(),
            pdf_ref: pdf_url.clone(),
            last_run_at: Utc::now(),
        };
        if let Err(e) = self.store.update_case_status(case_id, update).await {
            warn!(error = %e, "failed to persist case status");
        }
        info!(%status, run_id = %result.run_id, "case finished");

        CaseOutcome::Completed {
            case,
            status,
            result,
            gif_url,
            pdf_url,
        }
    }

    fn public_url(&self, path: Option<&std::path::Path>) -> Option<String> {
        path.map(|p| artifact_url(p, &self.artifact_root, &self.public_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::store::{Identity, JsonDatastore, StoreData, StoreError};
    use crate::orchestrator::TestStatus;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Runner that replays canned results and records the tasks it saw
    struct CannedRunner {
        results: Mutex<Vec<Result<RunResult, RunError>>>,
        tasks: Mutex<Vec<String>>,
    }

    impl CannedRunner {
        fn new(mut results: Vec<Result<RunResult, RunError>>) -> Self {
            results.reverse();
            Self {
                results: Mutex::new(results),
                tasks: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TaskRunner for CannedRunner {
        async fn run_task(&self, task: &str) -> Result<RunResult, RunError> {
            self.tasks.lock().unwrap().push(task.to_string());
            let next = self.results.lock().unwrap().pop();
            next.unwrap_or_else(|| panic!("runner exhausted"))
        }
    }

    /// Datastore whose writes always fail
    struct ReadOnlyStore(JsonDatastore);

    #[async_trait]
    impl Datastore for ReadOnlyStore {
        async fn get_case(&self, id: &str) -> Result<Option<TestCase>, StoreError> {
            self.0.get_case(id).await
        }

        async fn get_identity(&self, id: &str) -> Result<Option<Identity>, StoreError> {
            self.0.get_identity(id).await
        }

        async fn update_case_status(&self, _id: &str, _update: CaseUpdate) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
    }

    fn data() -> StoreData {
        let case = |id: &str, identity: &str| TestCase {
            id: id.to_string(),
            title: format!("title {}", id),
            identity_id: identity.to_string(),
            actions: vec!["Open the Courses tab".to_string()],
            status: None,
            gif_ref: None,
            pdf_ref: None,
            last_run_at: None,
        };
        StoreData {
            identities: vec![Identity {
                id: "u1".to_string(),
                name: "Student".to_string(),
                email: "student@example.com".to_string(),
            }],
            cases: vec![case("c1", "u1"), case("c2", "u1"), case("orphan", "ghost")],
        }
    }

    fn result(status: TestStatus) -> RunResult {
        RunResult {
            run_id: "run_x".to_string(),
            text: "done".to_string(),
            status,
            steps: Vec::new(),
            frame_count: 3,
            gif_ref: Some(PathBuf::from("/srv/runs/run_x/timelapse.gif")),
            pdf_ref: None,
        }
    }

    fn coordinator(runner: Arc<CannedRunner>, store: Arc<dyn Datastore>) -> BatchCoordinator {
        let settings = RunSettings::defaults().artifact_dir("/srv/runs");
        BatchCoordinator::new(runner, store, ScenarioSettings::defaults(), &settings)
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn creds(ids: &[&str]) -> HashMap<String, String> {
        ids.iter().map(|id| (id.to_string(), "pw".to_string())).collect()
    }

    #[tokio::test]
    async fn test_unresolved_cases_are_not_run() {
        let runner = Arc::new(CannedRunner::new(Vec::new()));
        let store = Arc::new(JsonDatastore::in_memory(data()));
        let batch = coordinator(runner.clone(), store)
            .run_batch(&ids(&["missing", "orphan", "c1"]), &creds(&["missing", "orphan"]))
            .await;

        assert_eq!(batch.total, 3);
        assert_eq!(batch.failed, 3);
        let errors: Vec<&str> = batch.items.iter().map(|i| i.error.as_deref().unwrap()).collect();
        assert!(errors[0].contains("missing"));
        assert!(errors[1].contains("ghost"));
        assert!(errors[2].contains("credential"));
        assert_eq!(batch.items[1].title, "title orphan");
        assert!(runner.tasks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completed_case_is_persisted() {
        let runner = Arc::new(CannedRunner::new(vec![Ok(result(TestStatus::Success))]));
        let store = Arc::new(JsonDatastore::in_memory(data()));
        let batch = coordinator(runner.clone(), store.clone())
            .run_batch(&ids(&["c1"]), &creds(&["c1"]))
            .await;

        assert_eq!((batch.passed, batch.failed), (1, 0));
        assert_eq!(batch.success_rate, 100.0);
        let item = &batch.items[0];
        assert_eq!(item.gif_ref.as_deref(), Some("/static/runs/run_x/timelapse.gif"));
        assert_eq!(item.result.as_deref(), Some("done"));

        let case = store.get_case("c1").await.unwrap().unwrap();
        assert_eq!(case.status.as_deref(), Some("passed"));
        assert_eq!(case.gif_ref, item.gif_ref);

        let tasks = runner.tasks.lock().unwrap();
        assert!(tasks[0].contains("student@example.com"));
        assert!(tasks[0].contains("1. Open the Courses tab"));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let runner = Arc::new(CannedRunner::new(vec![
            Err(RunError::Setup(std::io::Error::other("disk full"))),
            Ok(result(TestStatus::Unknown)),
        ]));
        let store = Arc::new(JsonDatastore::in_memory(data()));
        let batch = coordinator(runner, store)
            .run_batch(&ids(&["c1", "c2", "c1"]), &creds(&["c1", "c2"]))
            .await;

        // third run exhausts the runner and panics
        assert_eq!(batch.total, 3);
        assert_eq!(batch.failed, 3);
        assert!(batch.items[0].error.as_deref().unwrap().contains("disk full"));
        assert_eq!(batch.items[1].error, None);
        assert_eq!(batch.items[1].status, ItemStatus::Failed);
        assert!(batch.items[2].error.as_deref().unwrap().contains("runner exhausted"));
    }

    #[tokio::test]
    async fn test_persistence_errors_do_not_change_item() {
        let runner = Arc::new(CannedRunner::new(vec![Ok(result(TestStatus::Success))]));
        let store = Arc::new(ReadOnlyStore(JsonDatastore::in_memory(data())));
        let batch = coordinator(runner, store)
            .run_batch(&ids(&["c1"]), &creds(&["c1"]))
            .await;

        assert_eq!(batch.items[0].status, ItemStatus::Passed);
        assert_eq!(batch.items[0].error, None);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let runner = Arc::new(CannedRunner::new(Vec::new()));
        let store = Arc::new(JsonDatastore::in_memory(StoreData::default()));
        let batch = coordinator(runner, store).run_batch(&[], &HashMap::new()).await;
        assert_eq!(batch.total, 0);
        assert_eq!(batch.success_rate, 0.0);
    }
}
