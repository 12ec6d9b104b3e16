use crate::domain::critique::{CritiqueIssue, IssueCategory};
use crate::domain::test_artifact::{
    TestArtifact, TestType, CASES_PER_REQUIREMENT, MIN_STEPS_PER_CASE,
};
use serde::Serialize;
use std::collections::HashSet;

/// Structural checks that do not need a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub requirement_count: usize,
    pub test_case_count: usize,
    pub expected_case_count: usize,
    pub issues: Vec<CritiqueIssue>,
}

impl QualityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn inspect(artifact: &TestArtifact) -> QualityReport {
    let mut issues = Vec::new();
    let expected_case_count = artifact.expected_case_count();

    if artifact.requirements.is_empty() {
        issues.push(CritiqueIssue::structural(
            IssueCategory::Count,
            None,
            None,
            "No requirements were extracted",
        ));
    }
    if artifact.test_cases.len() != expected_case_count {
        issues.push(CritiqueIssue::structural(
            IssueCategory::Count,
            None,
            None,
            format!(
                "Expected {} test cases ({} requirements x {}), found {}",
                expected_case_count,
                artifact.requirements.len(),
                CASES_PER_REQUIREMENT,
                artifact.test_cases.len()
            ),
        ));
    }

    for requirement in &artifact.requirements {
        let cases: Vec<_> = artifact.cases_for(&requirement.id).collect();
        if cases.len() != CASES_PER_REQUIREMENT {
            issues.push(CritiqueIssue::structural(
                IssueCategory::Count,
                Some(&requirement.id),
                None,
                format!(
                    "Requirement {} has {} test cases, expected {}",
                    requirement.id,
                    cases.len(),
                    CASES_PER_REQUIREMENT
                ),
            ));
        }
        let present: HashSet<TestType> = cases.iter().map(|case| case.test_type).collect();
        for missing in TestType::ALL.into_iter().filter(|t| !present.contains(t)) {
            issues.push(CritiqueIssue::structural(
                IssueCategory::Coverage,
                Some(&requirement.id),
                None,
                format!(
                    "Requirement {} has no {} test case",
                    requirement.id,
                    missing.as_str()
                ),
            ));
        }
    }

    let known: HashSet<&str> = artifact
        .requirements
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    for case in &artifact.test_cases {
        if !known.contains(case.requirement_id.as_str()) {
            issues.push(CritiqueIssue::structural(
                IssueCategory::UnknownRequirement,
                None,
                Some(&case.title),
                format!(
                    "Test case references unknown requirement '{}'",
                    case.requirement_id
                ),
            ));
        }
        if case.steps.len() < MIN_STEPS_PER_CASE {
            issues.push(CritiqueIssue::structural(
                IssueCategory::StepCount,
                Some(&case.requirement_id),
                Some(&case.title),
                format!(
                    "Test case has {} steps, needs at least {}",
                    case.steps.len(),
                    MIN_STEPS_PER_CASE
                ),
            ));
        }
        let orphans = case.steps.iter().filter(|s| s.is_orphan()).count();
        if orphans > 0 {
            issues.push(CritiqueIssue::structural(
                IssueCategory::StepFormat,
                Some(&case.requirement_id),
                Some(&case.title),
                format!("{} action step(s) have no expected result", orphans),
            ));
        }
        if case.steps.iter().any(|s| s.action.trim().is_empty()) {
            issues.push(CritiqueIssue::structural(
                IssueCategory::StepFormat,
                Some(&case.requirement_id),
                Some(&case.title),
                "Expected result without a preceding action",
            ));
        }
    }

    QualityReport {
        requirement_count: artifact.requirements.len(),
        test_case_count: artifact.test_cases.len(),
        expected_case_count,
        issues,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::test_artifact::{Requirement, TestCase, TestStep};

    pub(crate) fn well_formed_artifact(requirement_ids: &[&str]) -> TestArtifact {
        let requirements = requirement_ids
            .iter()
            .map(|id| Requirement {
                id: id.to_string(),
                description: format!("{} behaviour", id),
                source: "QA-1".to_string(),
            })
            .collect();
        let test_cases = requirement_ids
            .iter()
            .flat_map(|id| {
                TestType::ALL.into_iter().map(move |test_type| TestCase {
                    requirement_id: id.to_string(),
                    title: format!("{} {}", id, test_type.as_str()),
                    priority: "High".to_string(),
                    test_type,
                    tags: Vec::new(),
                    steps: vec![
                        TestStep::new("Open the app", "Home screen shown"),
                        TestStep::new("Perform the action", "Action accepted"),
                        TestStep::new("Check the result", "Result stored"),
                    ],
                })
            })
            .collect();
        TestArtifact {
            requirements,
            test_cases,
        }
    }

    #[test]
    fn well_formed_artifact_is_clean() {
        let report = inspect(&well_formed_artifact(&["REQ-1", "REQ-2"]));
        assert!(report.is_clean(), "{:?}", report.issues);
        assert_eq!(report.expected_case_count, 6);
        assert_eq!(report.test_case_count, 6);
    }

    #[test]
    fn flags_count_and_coverage() {
        let mut artifact = well_formed_artifact(&["REQ-1"]);
        artifact.test_cases.retain(|c| c.test_type != TestType::Negative);

        let report = inspect(&artifact);
        let categories: Vec<_> = report.issues.iter().map(|i| i.category).collect();
        assert_eq!(
            categories,
            vec![
                IssueCategory::Count,
                IssueCategory::Count,
                IssueCategory::Coverage
            ]
        );
        assert_eq!(report.issues[2].requirement_id.as_deref(), Some("REQ-1"));
    }

    #[test]
    fn flags_orphans_short_cases_and_unknown_requirements() {
        let mut artifact = well_formed_artifact(&["REQ-1"]);
        artifact.test_cases[0].steps[1].expected = None;
        artifact.test_cases[1].steps.truncate(2);
        artifact.test_cases[2].requirement_id = "REQ-9".to_string();

        let report = inspect(&artifact);
        let has = |category: IssueCategory| report.issues.iter().any(|i| i.category == category);
        assert!(has(IssueCategory::StepFormat));
        assert!(has(IssueCategory::StepCount));
        assert!(has(IssueCategory::UnknownRequirement));
        assert!(report.issues.iter().all(|i| i.category.is_structural()));
    }

    #[test]
    fn empty_artifact_reports_missing_requirements() {
        let report = inspect(&TestArtifact::default());
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].category, IssueCategory::Count);
    }
}
