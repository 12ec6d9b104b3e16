use crate::domain::critique::{
    CritiqueIssue, CritiqueVerdict, IssueCategory, IssueSeverity, OverallQuality,
};
use crate::domain::error::{AppError, Result};
use crate::domain::test_artifact::{Requirement, TestArtifact, TestCase, TestStep, TestType};
use crate::infrastructure::response::extract_json;
use serde_json::Value;
use tracing::warn;

const SNIPPET_CHARS: usize = 400;

/// Parse a generation or fix response.
///
/// When the payload carries no `requirements` array, `fallback_requirements` is used
/// (fix responses sometimes return only the revised cases).
pub(crate) fn parse_test_artifact(
    raw: &str,
    fallback_requirements: Option<&[Requirement]>,
) -> Result<TestArtifact> {
    let payload = extract_json(raw).ok_or_else(|| malformed("test artifact", raw))?;

    let requirements = match array_field(&payload, &["requirements"]) {
        Some(items) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| parse_requirement(index, item))
            .collect(),
        None => match fallback_requirements {
            Some(requirements) => requirements.to_vec(),
            None => {
                return Err(AppError::ParseError(
                    "LLM output has no requirements array".to_string(),
                ))
            }
        },
    };

    let cases = array_field(&payload, &["test_cases", "testCases", "cases"]).ok_or_else(|| {
        AppError::ParseError("LLM output has no test_cases array".to_string())
    })?;
    let test_cases: Vec<TestCase> = cases.iter().filter_map(parse_test_case).collect();

    let artifact = TestArtifact {
        requirements,
        test_cases,
    };
    if artifact.is_empty() {
        return Err(AppError::ParseError(
            "LLM output contains no requirements or test cases".to_string(),
        ));
    }
    Ok(artifact)
}

/// Parse a critique response. A payload without an `approved` flag is malformed.
pub(crate) fn parse_verdict(raw: &str) -> Result<CritiqueVerdict> {
    let payload = extract_json(raw).ok_or_else(|| malformed("critique", raw))?;

    let approved = payload
        .get("approved")
        .and_then(as_bool)
        .ok_or_else(|| AppError::ParseError("Critique has no approved flag".to_string()))?;

    let issues_found = array_field(&payload, &["issues_found", "issues"])
        .map(|items| items.iter().filter_map(parse_issue).collect())
        .unwrap_or_default();

    Ok(CritiqueVerdict {
        approved,
        overall_quality: string_field(&payload, &["overall_quality", "quality"])
            .map(|q| OverallQuality::parse(&q))
            .unwrap_or_default(),
        confidence_score: payload
            .get("confidence_score")
            .or_else(|| payload.get("confidence"))
            .and_then(Value::as_f64)
            .map(normalize_confidence)
            .unwrap_or(0.0),
        issues_found,
        recommendation: string_field(&payload, &["recommendation", "summary"]).unwrap_or_default(),
    })
}

fn parse_requirement(index: usize, item: &Value) -> Option<Requirement> {
    match item {
        Value::String(text) if !text.trim().is_empty() => Some(Requirement {
            id: format!("REQ-{}", index + 1),
            description: text.trim().to_string(),
            source: String::new(),
        }),
        Value::Object(_) => {
            let description = string_field(item, &["description", "text", "requirement"])?;
            Some(Requirement {
                id: string_field(item, &["id", "requirement_id", "requirementId"])
                    .unwrap_or_else(|| format!("REQ-{}", index + 1)),
                description,
                source: string_field(item, &["source", "source_key", "issue_key"])
                    .unwrap_or_default(),
            })
        }
        _ => None,
    }
}

fn parse_test_case(item: &Value) -> Option<TestCase> {
    let title = string_field(item, &["title", "name"])?;
    let raw_type = string_field(item, &["test_type", "testType", "type"]).unwrap_or_default();
    let Some(test_type) = TestType::parse(&raw_type) else {
        warn!(title = %title, test_type = %raw_type, "Dropping test case with unknown type");
        return None;
    };

    Some(TestCase {
        requirement_id: string_field(item, &["requirement_id", "requirementId", "requirement"])
            .unwrap_or_default(),
        title,
        priority: string_field(item, &["priority"]).unwrap_or_else(|| "Medium".to_string()),
        test_type,
        tags: item
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        steps: item
            .get("steps")
            .and_then(Value::as_array)
            .map(|steps| parse_steps(steps))
            .unwrap_or_default(),
    })
}

/// Steps come either as `{action, expected}` objects or as a flat list where an
/// `Expected:` line belongs to the action before it. Unpaired actions stay orphans.
pub(crate) fn parse_steps(items: &[Value]) -> Vec<TestStep> {
    let mut steps: Vec<TestStep> = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(_) => {
                let action = string_field(item, &["action", "step", "description"])
                    .unwrap_or_default();
                let expected =
                    string_field(item, &["expected", "expected_result", "expectedResult", "result"]);
                steps.push(TestStep { action, expected });
            }
            Value::String(line) => {
                let line = strip_numbering(line);
                if line.is_empty() {
                    continue;
                }
                if let Some(expected) = strip_expected_prefix(line) {
                    let previous = steps.last_mut().filter(|step| step.is_orphan());
                    if let Some(previous) = previous {
                        previous.expected = Some(expected.to_string());
                    } else {
                        steps.push(TestStep {
                            action: String::new(),
                            expected: Some(expected.to_string()),
                        });
                    }
                } else {
                    let action = strip_action_prefix(line);
                    steps.push(TestStep {
                        action: action.to_string(),
                        expected: None,
                    });
                }
            }
            _ => {}
        }
    }
    steps
}

fn parse_issue(item: &Value) -> Option<CritiqueIssue> {
    match item {
        Value::String(text) if !text.trim().is_empty() => Some(CritiqueIssue {
            category: IssueCategory::Other,
            severity: IssueSeverity::Minor,
            requirement_id: None,
            test_case_title: None,
            description: text.trim().to_string(),
        }),
        Value::Object(_) => Some(CritiqueIssue {
            category: string_field(item, &["category", "type"])
                .map(|c| IssueCategory::parse(&c))
                .unwrap_or(IssueCategory::Other),
            severity: string_field(item, &["severity"])
                .map(|s| IssueSeverity::parse(&s))
                .unwrap_or_default(),
            requirement_id: string_field(item, &["requirement_id", "requirementId"]),
            test_case_title: string_field(item, &["test_case_title", "test_case", "title"]),
            description: string_field(item, &["description", "issue", "message"])?,
        }),
        _ => None,
    }
}

fn strip_numbering(line: &str) -> &str {
    let trimmed = line.trim();
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
    }
    trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .unwrap_or(trimmed)
        .trim_start()
}

fn strip_expected_prefix(line: &str) -> Option<&str> {
    strip_label(line, &["expected result", "expected"])
}

fn strip_action_prefix(line: &str) -> &str {
    strip_label(line, &["action", "step"]).unwrap_or(line)
}

/// Case-insensitive `Label:` prefix removal.
fn strip_label<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    let lower = line.to_ascii_lowercase();
    for label in labels {
        if lower.starts_with(label) {
            let rest = line[label.len()..].trim_start();
            if let Some(rest) = rest.strip_prefix(':') {
                return Some(rest.trim());
            }
        }
    }
    None
}

fn array_field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Vec<Value>> {
    names
        .iter()
        .find_map(|name| value.get(*name).and_then(Value::as_array))
}

fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        value
            .get(*name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn normalize_confidence(value: f64) -> f32 {
    let scaled = if value > 1.0 { value / 100.0 } else { value };
    scaled.clamp(0.0, 1.0) as f32
}

fn malformed(what: &str, raw: &str) -> AppError {
    let snippet: String = raw.chars().take(SNIPPET_CHARS).collect();
    AppError::ParseError(format!(
        "No JSON {} in LLM output | output_snippet={}",
        what, snippet
    ))
}
