use serde::{Deserialize, Serialize};

/// Number of test cases required per requirement, one per [`TestType`].
pub const CASES_PER_REQUIREMENT: usize = 3;
pub const MIN_STEPS_PER_CASE: usize = 3;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub id: String,
    pub description: String,
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TestType {
    Positive,
    Negative,
    EdgeCase,
}

impl TestType {
    pub const ALL: [TestType; 3] = [TestType::Positive, TestType::Negative, TestType::EdgeCase];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Positive => "Positive",
            TestType::Negative => "Negative",
            TestType::EdgeCase => "EdgeCase",
        }
    }

    /// Lenient parse used on model output ("edge case", "edge_case", "EDGE-CASE", ...).
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "positive" | "happypath" => Some(TestType::Positive),
            "negative" => Some(TestType::Negative),
            "edgecase" | "edge" | "boundary" => Some(TestType::EdgeCase),
            _ => None,
        }
    }
}

/// One action with its expected result. `expected` is `None` for an orphan action.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct TestStep {
    pub action: String,
    pub expected: Option<String>,
}

impl TestStep {
    pub fn new(action: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            expected: Some(expected.into()),
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.expected
            .as_deref()
            .map(|expected| expected.trim().is_empty())
            .unwrap_or(true)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub requirement_id: String,
    pub title: String,
    pub priority: String,
    pub test_type: TestType,
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<TestStep>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct TestArtifact {
    pub requirements: Vec<Requirement>,
    pub test_cases: Vec<TestCase>,
}

impl TestArtifact {
    pub fn expected_case_count(&self) -> usize {
        self.requirements.len() * CASES_PER_REQUIREMENT
    }

    pub fn cases_for<'a>(&'a self, requirement_id: &'a str) -> impl Iterator<Item = &'a TestCase> {
        self.test_cases
            .iter()
            .filter(move |case| case.requirement_id == requirement_id)
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty() && self.test_cases.is_empty()
    }
}
