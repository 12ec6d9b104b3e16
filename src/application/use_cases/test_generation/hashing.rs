use crate::domain::test_artifact::{TestArtifact, TestCase};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// SHA-256 over the whitespace/case-normalised content of a test case.
pub(crate) fn fingerprint_case(case: &TestCase) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(&case.requirement_id));
    hasher.update([0u8]);
    hasher.update(normalize(&case.title));
    hasher.update([0u8]);
    hasher.update(case.test_type.as_str());
    hasher.update([0u8]);
    hasher.update(normalize(&case.priority));
    for step in &case.steps {
        hasher.update([1u8]);
        hasher.update(normalize(&step.action));
        hasher.update([2u8]);
        hasher.update(normalize(step.expected.as_deref().unwrap_or_default()));
    }
    hex::encode(hasher.finalize())
}

pub(crate) fn fingerprint_cases(artifact: &TestArtifact) -> HashSet<String> {
    artifact.test_cases.iter().map(fingerprint_case).collect()
}

/// Cases in `current` whose fingerprint is not in `previous`.
pub(crate) fn count_changed(previous: &HashSet<String>, current: &TestArtifact) -> usize {
    current
        .test_cases
        .iter()
        .filter(|case| !previous.contains(&fingerprint_case(case)))
        .count()
}

pub(crate) fn normalize_language(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        "English".to_string()
    } else {
        trimmed.to_string()
    }
}

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
