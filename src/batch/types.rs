use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orchestrator::ResponseStatus;

/// Pass/fail verdict for one case in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Passed,
    Failed,
}

impl ItemStatus {
    /// Map a run status onto a verdict; only success-like statuses pass
    pub fn from_run_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "success" | "passed" | "completed" => ItemStatus::Passed,
            _ => ItemStatus::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Passed => "passed",
            ItemStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result for one case of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub case_id: String,

    pub title: String,

    pub status: ItemStatus,

    /// Why the case failed before or during its run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The run's final text, when a run happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    #[serde(default, rename = "gif_url", skip_serializing_if = "Option::is_none")]
    pub gif_ref: Option<String>,

    #[serde(default, rename = "pdf_url", skip_serializing_if = "Option::is_none")]
    pub pdf_ref: Option<String>,
}

impl BatchItemResult {
    /// A failed item for a case whose run never produced a result
    pub fn failed(case_id: impl Into<String>, title: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            title: title.into(),
            status: ItemStatus::Failed,
            error: Some(error.into()),
            result: None,
            gif_ref: None,
            pdf_ref: None,
        }
    }
}

/// Aggregate of a whole batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub run_id: String,

    #[serde(rename = "total_tests")]
    pub total: usize,

    pub passed: usize,

    pub failed: usize,

    /// Percentage of passed cases, rounded to two decimals
    pub success_rate: f64,

    #[serde(rename = "results")]
    pub items: Vec<BatchItemResult>,

    pub timestamp: DateTime<Utc>,
}

impl BatchResult {
    /// Aggregate `items` into counts and a success rate
    pub fn from_items(run_id: impl Into<String>, items: Vec<BatchItemResult>, timestamp: DateTime<Utc>) -> Self {
        let total = items.len();
        let passed = items
            .iter()
            .filter(|item| item.status == ItemStatus::Passed)
            .count();
        Self {
            run_id: run_id.into(),
            total,
            passed,
            failed: total - passed,
            success_rate: success_rate(passed, total),
            items,
            timestamp,
        }
    }

    /// Build the payload exposed to the HTTP layer
    pub fn to_response(&self) -> BatchResponse {
        BatchResponse {
            status: ResponseStatus::Success,
            batch: self.clone(),
        }
    }
}

/// JSON payload for a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub status: ResponseStatus,
    #[serde(flatten)]
    pub batch: BatchResult,
}

/// `passed / total * 100` rounded to two decimals, `0` for an empty batch
pub fn success_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = passed as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(status: ItemStatus) -> BatchItemResult {
        BatchItemResult {
            status,
            ..BatchItemResult::failed("c", "t", "e")
        }
    }

    #[test]
    fn test_from_run_status() {
        for status in ["success", "Passed", " completed "] {
            assert_eq!(ItemStatus::from_run_status(status), ItemStatus::Passed);
        }
        for status in ["fail", "unknown", "", "error"] {
            assert_eq!(ItemStatus::from_run_status(status), ItemStatus::Failed);
        }
    }

    #[test]
    fn test_success_rate_rounding() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(1, 2), 50.0);
        assert_eq!(success_rate(1, 3), 33.33);
        assert_eq!(success_rate(2, 3), 66.67);
        assert_eq!(success_rate(3, 3), 100.0);
    }

    #[test]
    fn test_aggregate_counts() {
        let items = vec![
            item(ItemStatus::Passed),
            item(ItemStatus::Failed),
            item(ItemStatus::Failed),
        ];
        let batch = BatchResult::from_items("batch_1", items, Utc::now());
        assert_eq!(batch.total, 3);
        assert_eq!(batch.passed, 1);
        assert_eq!(batch.failed, 2);
        assert_eq!(batch.total, batch.passed + batch.failed);
        assert_eq!(batch.success_rate, 33.33);
    }

    #[test]
    fn test_empty_batch() {
        let batch = BatchResult::from_items("batch_0", Vec::new(), Utc::now());
        assert_eq!((batch.total, batch.passed, batch.failed), (0, 0, 0));
        assert_eq!(batch.success_rate, 0.0);
    }

    #[test]
    fn test_response_shape() {
        let batch = BatchResult::from_items("batch_1", vec![item(ItemStatus::Passed)], Utc::now());
        let json = serde_json::to_value(batch.to_response()).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["run_id"], "batch_1");
        assert_eq!(json["total_tests"], 1);
        assert_eq!(json["passed"], 1);
        assert_eq!(json["failed"], 0);
        assert_eq!(json["success_rate"], 100.0);
        assert_eq!(json["results"][0]["status"], "passed");
        assert_eq!(json["results"][0]["error"], "e");
        assert!(json["results"][0].get("gif_url").is_none());
        assert!(json.get("timestamp").is_some());
    }
}
