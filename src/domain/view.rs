use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedView {
    pub id: String,
    pub name: String,
    /// Caller-defined filter specification, stored verbatim.
    pub filters: Value,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A view as returned by listings, annotated against the session's default pointer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewSummary {
    #[serde(flatten)]
    pub view: SavedView,
    pub is_default: bool,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewUpdate {
    pub name: Option<String>,
    pub filters: Option<Value>,
    pub description: Option<String>,
}

impl ViewUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.filters.is_none() && self.description.is_none()
    }
}
