use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ISSUE_KEY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*-\d+$").unwrap());

/// `PROJECT-123` shaped key, as issued by the tracker.
pub fn is_issue_key(key: &str) -> bool {
    ISSUE_KEY_PATTERN.is_match(key)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub key: String,
    pub summary: String,
    pub description: Option<String>,
    pub issue_type: String,
    pub status: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub parent_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub id: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub size: u64,
    pub content_url: String,
}

impl AttachmentMeta {
    /// Lower-cased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.trim().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedAttachment {
    pub attachment_id: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub text: String,
    pub char_count: usize,
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_keys_must_be_project_dash_number() {
        assert!(is_issue_key("QA-1"));
        assert!(is_issue_key("PAY_2-1042"));
        assert!(!is_issue_key("qa-1"));
        assert!(!is_issue_key("QA-1 OR project = SEC"));
        assert!(!is_issue_key("QA-"));
        assert!(!is_issue_key("QA-1\""));
    }

    fn meta(filename: &str) -> AttachmentMeta {
        AttachmentMeta {
            id: "1".to_string(),
            filename: filename.to_string(),
            mime_type: None,
            size: 0,
            content_url: String::new(),
        }
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(meta("Spec.PDF").extension().as_deref(), Some("pdf"));
        assert_eq!(meta("notes.tar.gz").extension().as_deref(), Some("gz"));
        assert_eq!(meta("README").extension(), None);
        assert_eq!(meta("trailing.").extension(), None);
    }
}
