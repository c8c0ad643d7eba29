//! Batch execution of stored test cases.

pub mod coordinator;
pub mod store;
pub mod task;
pub mod types;

pub use coordinator::{BatchCoordinator, CaseOutcome, TaskRunner};
pub use store::{CaseUpdate, Datastore, Identity, JsonDatastore, StoreData, StoreError, TestCase};
pub use task::{case_instructions, compose_case_task, compose_task};
pub use types::{BatchItemResult, BatchResponse, BatchResult, ItemStatus, success_rate};
