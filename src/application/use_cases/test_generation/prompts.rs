use super::quality::QualityReport;
use super::GenerationRequest;
use crate::domain::critique::CritiqueVerdict;
use crate::domain::test_artifact::{TestArtifact, CASES_PER_REQUIREMENT, MIN_STEPS_PER_CASE};

const ARTIFACT_SCHEMA: &str = r#"{
  "requirements": [{"id": "REQ-1", "description": "...", "source": "ISSUE-KEY"}],
  "test_cases": [{
    "requirement_id": "REQ-1",
    "title": "...",
    "priority": "High|Medium|Low",
    "test_type": "Positive|Negative|EdgeCase",
    "tags": ["..."],
    "steps": [{"action": "...", "expected": "..."}]
  }]
}"#;

const VERDICT_SCHEMA: &str = r#"{
  "approved": true,
  "overall_quality": "excellent|good|fair|poor",
  "confidence_score": 0.0,
  "issues_found": [{
    "category": "count|coverage|step_format|step_count|unknown_requirement|realism|redundancy|other",
    "severity": "critical|major|minor",
    "requirement_id": "REQ-1",
    "test_case_title": "...",
    "description": "..."
  }],
  "recommendation": "..."
}"#;

fn artifact_rules() -> String {
    format!(
        "Rules:\n\
         - Exactly {per} test cases per requirement: one Positive, one Negative, one EdgeCase.\n\
         - Every test case has at least {steps} steps.\n\
         - Every step is an object with a non-empty action AND its expected result. Never emit an action without an expected result.\n\
         - requirement_id must match an id from the requirements list.\n",
        per = CASES_PER_REQUIREMENT,
        steps = MIN_STEPS_PER_CASE
    )
}

pub(crate) fn build_generation_system_prompt(language: &str) -> String {
    format!(
        "You are a senior QA engineer. Extract the testable requirements from the epic and its stories, then write test cases for them. Respond in {}.\n{}\nReturn only JSON with this shape:\n{}",
        language,
        artifact_rules(),
        ARTIFACT_SCHEMA
    )
}

pub(crate) fn build_generation_user_prompt(request: &GenerationRequest) -> String {
    let mut body = String::new();
    body.push_str(&format!("Epic key: {}\n", request.epic_key));
    body.push_str(&format!("Epic summary: {}\n", request.summary));
    body.push_str(&format!("Response language: {}\n", request.language));
    body.push_str("\nContext:\n");
    body.push_str(&request.context);
    body.push('\n');
    body
}

pub(crate) fn build_critique_system_prompt() -> String {
    format!(
        "You are a strict QA reviewer. Judge the test cases against their requirements.\n\
         Check counts ({per} per requirement), coverage of Positive/Negative/EdgeCase, step format (each action immediately paired with its expected result), realism and redundancy.\n\
         Approve only when there are no critical or major problems.\n\
         Return only JSON with this shape:\n{schema}",
        per = CASES_PER_REQUIREMENT,
        schema = VERDICT_SCHEMA
    )
}

pub(crate) fn build_critique_user_prompt(
    summary: &str,
    artifact: &TestArtifact,
    local: &QualityReport,
) -> String {
    let mut body = String::new();
    body.push_str(&format!("Epic summary: {}\n", summary));
    body.push_str(&format!(
        "Requirements: {}, test cases: {} (expected {})\n",
        local.requirement_count, local.test_case_count, local.expected_case_count
    ));

    if !local.issues.is_empty() {
        body.push_str("\nAutomated checks already found:\n");
        for issue in &local.issues {
            body.push_str(&format!("- {}\n", issue.description));
        }
    }

    body.push_str("\nArtifact:\n");
    body.push_str(&artifact_json(artifact));
    body.push('\n');
    body
}

pub(crate) fn build_fix_system_prompt(language: &str) -> String {
    format!(
        "You are a senior QA engineer repairing test cases after review. Respond in {}.\n\
         Keep test cases that were not flagged exactly as they are. Repair the flagged ones, and add or remove cases so the count is correct.\n{}\
         Return the COMPLETE revised artifact (all requirements and all test cases), only JSON, with this shape:\n{}",
        language,
        artifact_rules(),
        ARTIFACT_SCHEMA
    )
}

pub(crate) fn build_fix_user_prompt(artifact: &TestArtifact, verdict: &CritiqueVerdict) -> String {
    let mut body = String::new();
    body.push_str("Review findings:\n");
    if verdict.issues_found.is_empty() {
        body.push_str("- (no itemised issues) re-check every rule\n");
    }
    for issue in &verdict.issues_found {
        let mut target = String::new();
        if let Some(requirement_id) = issue.requirement_id.as_deref() {
            target.push_str(&format!(" [{}]", requirement_id));
        }
        if let Some(title) = issue.test_case_title.as_deref() {
            target.push_str(&format!(" \"{}\"", title));
        }
        body.push_str(&format!(
            "- {:?}/{:?}{}: {}\n",
            issue.severity, issue.category, target, issue.description
        ));
    }
    if !verdict.recommendation.trim().is_empty() {
        body.push_str(&format!("\nReviewer recommendation: {}\n", verdict.recommendation));
    }

    body.push_str("\nCurrent artifact:\n");
    body.push_str(&artifact_json(artifact));
    body.push('\n');
    body
}

fn artifact_json(artifact: &TestArtifact) -> String {
    serde_json::to_string_pretty(artifact).unwrap_or_else(|_| format!("{:?}", artifact))
}
