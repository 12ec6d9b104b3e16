use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverallQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OverallQuality {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "excellent" => OverallQuality::Excellent,
            "good" => OverallQuality::Good,
            "fair" | "acceptable" => OverallQuality::Fair,
            "poor" | "bad" => OverallQuality::Poor,
            _ => OverallQuality::Unknown,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Count,
    Coverage,
    StepFormat,
    StepCount,
    UnknownRequirement,
    Realism,
    Redundancy,
    Other,
}

impl IssueCategory {
    pub fn parse(value: &str) -> Self {
        let normalized: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "count" | "testcount" => IssueCategory::Count,
            "coverage" | "missingtype" => IssueCategory::Coverage,
            "stepformat" | "format" | "orphan" => IssueCategory::StepFormat,
            "stepcount" | "steps" => IssueCategory::StepCount,
            "unknownrequirement" => IssueCategory::UnknownRequirement,
            "realism" | "unrealistic" => IssueCategory::Realism,
            "redundancy" | "duplicate" | "redundant" => IssueCategory::Redundancy,
            _ => IssueCategory::Other,
        }
    }

    /// Categories checked deterministically before the model is consulted.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            IssueCategory::Count
                | IssueCategory::Coverage
                | IssueCategory::StepFormat
                | IssueCategory::StepCount
                | IssueCategory::UnknownRequirement
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Critical,
    Major,
    #[default]
    Minor,
}

impl IssueSeverity {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" | "blocker" | "high" => IssueSeverity::Critical,
            "major" | "medium" => IssueSeverity::Major,
            _ => IssueSeverity::Minor,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CritiqueIssue {
    pub category: IssueCategory,
    pub severity: IssueSeverity,
    pub requirement_id: Option<String>,
    pub test_case_title: Option<String>,
    pub description: String,
}

impl CritiqueIssue {
    pub fn structural(
        category: IssueCategory,
        requirement_id: Option<&str>,
        test_case_title: Option<&str>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity: IssueSeverity::Critical,
            requirement_id: requirement_id.map(str::to_string),
            test_case_title: test_case_title.map(str::to_string),
            description: description.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CritiqueVerdict {
    pub approved: bool,
    pub overall_quality: OverallQuality,
    pub confidence_score: f32,
    pub issues_found: Vec<CritiqueIssue>,
    pub recommendation: String,
}

impl CritiqueVerdict {
    pub fn approved() -> Self {
        Self {
            approved: true,
            overall_quality: OverallQuality::Good,
            confidence_score: 1.0,
            issues_found: Vec::new(),
            recommendation: String::new(),
        }
    }

    pub fn rejected(issues: Vec<CritiqueIssue>) -> Self {
        Self {
            approved: false,
            overall_quality: OverallQuality::Poor,
            confidence_score: 1.0,
            issues_found: issues,
            recommendation: String::new(),
        }
    }

    pub fn structural_issues(&self) -> impl Iterator<Item = &CritiqueIssue> {
        self.issues_found
            .iter()
            .filter(|issue| issue.category.is_structural())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_quality_deserializes_to_unknown() {
        let quality: OverallQuality = serde_json::from_str("\"stellar\"").unwrap();
        assert_eq!(quality, OverallQuality::Unknown);
        let quality: OverallQuality = serde_json::from_str("\"good\"").unwrap();
        assert_eq!(quality, OverallQuality::Good);
    }

    #[test]
    fn category_parse_accepts_model_spellings() {
        assert_eq!(IssueCategory::parse("step_format"), IssueCategory::StepFormat);
        assert_eq!(IssueCategory::parse("Duplicate"), IssueCategory::Redundancy);
        assert_eq!(IssueCategory::parse("test count"), IssueCategory::Count);
        assert_eq!(IssueCategory::parse("tone"), IssueCategory::Other);
        assert!(IssueCategory::Count.is_structural());
        assert!(!IssueCategory::Realism.is_structural());
    }
}
