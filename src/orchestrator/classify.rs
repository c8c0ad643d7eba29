//! Normalization of raw agent output into a [`StructuredResult`].
//!
//! Agents usually print their structured outcome as a JSON object, but it
//! may be surrounded by log lines or wrapped in a fenced block. Candidates
//! are tried in order and the first one that matches the schema wins;
//! anything else degrades to [`StructuredResult::no_result`].

use super::types::StructuredResult;
use crate::engine::RawOutcome;

/// Classify an agent outcome. Never fails.
pub fn classify(raw: Option<&RawOutcome>) -> StructuredResult {
    raw.and_then(|raw| parse_structured(raw.as_str()))
        .unwrap_or_else(StructuredResult::no_result)
}

/// Parse `text` against the schema, `None` if no candidate matches
pub fn parse_structured(text: &str) -> Option<StructuredResult> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    candidates(text)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<StructuredResult>(candidate).ok())
}

fn candidates(text: &str) -> Vec<&str> {
    let mut found = vec![text];
    if let Some(last) = text.lines().map(str::trim).rev().find(|l| !l.is_empty()) {
        if last != text {
            found.push(last);
        }
    }
    if let Some(block) = fenced_json(text) {
        found.push(block);
    }
    found
}

fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let len = text[start..].find("```")?;
    Some(text[start..start + len].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::types::{NO_RESULT_TEXT, Step, TestStatus};
    use pretty_assertions::assert_eq;

    const VALID: &str = r#"{"steps":[{"action":"click","description":"Pressed login"}],"final_text":"Logged in","status":"success"}"#;

    fn expected_valid() -> StructuredResult {
        StructuredResult {
            steps: vec![Step {
                action: "click".to_string(),
                description: "Pressed login".to_string(),
            }],
            final_text: "Logged in".to_string(),
            status: TestStatus::Success,
        }
    }

    #[test]
    fn test_valid_outcome_returned_verbatim() {
        assert_eq!(classify(Some(&RawOutcome::new(VALID))), expected_valid());
    }

    #[test]
    fn test_outcome_after_log_lines() {
        let raw = RawOutcome::new(format!("INFO step 1\nINFO step 2\n{}\n", VALID));
        assert_eq!(classify(Some(&raw)), expected_valid());
    }

    #[test]
    fn test_fenced_outcome() {
        let raw = RawOutcome::new(format!("Here you go:\n```json\n{}\n```\nDone.", VALID));
        assert_eq!(classify(Some(&raw)), expected_valid());
    }

    #[test]
    fn test_malformed_outcomes_default_to_fail() {
        let malformed = [
            "",
            "   \n",
            r#"{"steps": [{"action": "click""#,
            r#"{"final_text": "x", "status": "success"}"#,
            r#"{"steps": [], "final_text": "x", "status": "passed"}"#,
            r#"{"steps": "none", "final_text": "x", "status": "fail"}"#,
            r#"[1, 2, 3]"#,
            "The login worked fine.",
        ];
        for text in malformed {
            let result = classify(Some(&RawOutcome::new(text)));
            assert_eq!(result.status, TestStatus::Fail, "input: {text:?}");
            assert_eq!(result.final_text, NO_RESULT_TEXT, "input: {text:?}");
            assert!(result.steps.is_empty(), "input: {text:?}");
        }
    }

    #[test]
    fn test_missing_outcome_defaults_to_fail() {
        assert_eq!(classify(None), StructuredResult::no_result());
    }

    #[test]
    fn test_unknown_status_and_extra_fields_accepted() {
        let raw = RawOutcome::new(
            r#"{"steps":[],"final_text":"Unclear","status":"unknown","confidence":0.4}"#,
        );
        let result = classify(Some(&raw));
        assert_eq!(result.status, TestStatus::Unknown);
        assert_eq!(result.final_text, "Unclear");
    }
}
