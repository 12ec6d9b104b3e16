use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminator for a draft payload. The store never looks inside `data`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DraftDataType {
    EpicAnalysis,
    TestTickets,
    TestCases,
    Custom(String),
}

impl DraftDataType {
    pub fn as_str(&self) -> &str {
        match self {
            DraftDataType::EpicAnalysis => "epic_analysis",
            DraftDataType::TestTickets => "test_tickets",
            DraftDataType::TestCases => "test_cases",
            DraftDataType::Custom(name) => name.as_str(),
        }
    }
}

impl From<&str> for DraftDataType {
    fn from(value: &str) -> Self {
        match value {
            "epic_analysis" => DraftDataType::EpicAnalysis,
            "test_tickets" => DraftDataType::TestTickets,
            "test_cases" => DraftDataType::TestCases,
            other => DraftDataType::Custom(other.to_string()),
        }
    }
}

impl From<String> for DraftDataType {
    fn from(value: String) -> Self {
        DraftDataType::from(value.as_str())
    }
}

impl From<DraftDataType> for String {
    fn from(value: DraftDataType) -> Self {
        value.as_str().to_string()
    }
}

pub type DraftMetadata = Map<String, Value>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: String,
    pub data_type: DraftDataType,
    pub data: Value,
    pub metadata: DraftMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Draft {
    /// Live iff `now <= expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn summary(&self) -> DraftSummary {
        DraftSummary {
            id: self.id.clone(),
            data_type: self.data_type.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
        }
    }
}

/// Listing view of a draft; carries no payload.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub id: String,
    pub data_type: DraftDataType,
    pub metadata: DraftMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_round_trips_through_strings() {
        assert_eq!(DraftDataType::from("test_cases"), DraftDataType::TestCases);
        assert_eq!(
            DraftDataType::from("release_notes"),
            DraftDataType::Custom("release_notes".to_string())
        );
        let json = serde_json::to_string(&DraftDataType::EpicAnalysis).unwrap();
        assert_eq!(json, "\"epic_analysis\"");
    }

    #[test]
    fn summary_serialization_has_no_data_key() {
        let now = Utc::now();
        let draft = Draft {
            id: "d1".to_string(),
            data_type: DraftDataType::TestCases,
            data: serde_json::json!({"secret": true}),
            metadata: DraftMetadata::new(),
            created_at: now,
            updated_at: now,
            expires_at: now,
        };
        let value = serde_json::to_value(draft.summary()).unwrap();
        assert!(value.get("data").is_none());
        assert_eq!(value["dataType"], "test_cases");
    }
}
