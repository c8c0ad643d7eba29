// Task text sent to the agent: a login preamble, the case's actions and the reporting contract

use std::fmt::Write;

use super::store::TestCase;
use crate::config::ScenarioSettings;

pub const EMAIL_SELECTOR: &str = r#"input[type="email"]"#;
pub const PASSWORD_SELECTOR: &str = r#"input[type="password"]"#;
pub const SUBMIT_SELECTOR: &str = r#"button[type="submit"]"#;

const REPORT_INSTRUCTION: &str = "When you are done, reply with only a JSON object of the form \
{\"steps\": [{\"action\": \"...\", \"description\": \"...\"}], \"final_text\": \"...\", \
\"status\": \"success\" | \"fail\"}. Use \"success\" only if every action above worked.";

/// Login preamble followed by `instructions` and the reporting contract
pub fn compose_task(scenario: &ScenarioSettings, email: &str, password: &str, instructions: &str) -> String {
    let mut task = String::new();
    // writing into a String cannot fail
    let _ = writeln!(task, "Go to {}.", scenario.login_url);
    let _ = writeln!(task, "Type \"{}\" into the email field ({}).", email, EMAIL_SELECTOR);
    let _ = writeln!(task, "Type \"{}\" into the password field ({}).", password, PASSWORD_SELECTOR);
    let _ = writeln!(task, "Click the login button ({}).", SUBMIT_SELECTOR);
    let _ = writeln!(
        task,
        "Confirm the login worked by checking that \"{}\" is visible on the page. \
         If the login fails, retry it once.",
        scenario.login_marker
    );
    task.push('\n');
    task.push_str(instructions.trim());
    task.push_str("\n\n");
    task.push_str(REPORT_INSTRUCTION);
    task
}

/// The numbered post-login actions of `case`
pub fn case_instructions(case: &TestCase) -> String {
    if case.actions.is_empty() {
        return "After login: no further actions, report whether the login succeeded.".to_string();
    }
    let mut text = String::from("After login:");
    for (i, action) in case.actions.iter().enumerate() {
        let _ = write!(text, "\n{}. {}", i + 1, action.trim());
    }
    text
}

/// Full task for one stored case
pub fn compose_case_task(scenario: &ScenarioSettings, email: &str, password: &str, case: &TestCase) -> String {
    compose_task(scenario, email, password, &case_instructions(case))
}
