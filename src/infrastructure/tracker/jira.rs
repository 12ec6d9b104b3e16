use super::IssueTracker;
use crate::domain::error::{AppError, Result};
use crate::domain::issue::{is_issue_key, AttachmentMeta, IssueRecord};
use crate::infrastructure::config::JiraSettings;
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

const ISSUE_FIELDS: &str = "summary,description,issuetype,status,labels,parent,attachment";
const SEARCH_PAGE_SIZE: u64 = 100;

/// Jira REST (v2) client.
pub struct JiraClient {
    client: reqwest::Client,
    settings: JiraSettings,
}

impl JiraClient {
    pub fn new(settings: JiraSettings) -> Self {
        Self {
            client: crate::infrastructure::llm_clients::build_http_client(settings.timeout_secs),
            settings,
        }
    }

    fn api_url(&self, path: &str) -> Result<Url> {
        let base = if self.settings.base_url.ends_with('/') {
            self.settings.base_url.clone()
        } else {
            format!("{}/", self.settings.base_url)
        };
        Url::parse(&base)
            .and_then(|base| base.join(path))
            .map_err(|e| AppError::ConfigError(format!("Invalid Jira base URL: {}", e)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.settings.email, &self.settings.api_token) {
            (Some(email), Some(token)) if !email.trim().is_empty() => {
                request.basic_auth(email, Some(token))
            }
            (_, Some(token)) => request.bearer_auth(token),
            _ => request,
        }
    }

    async fn get_json(&self, url: Url, key: &str) -> Result<Value> {
        debug!(url = %url, "Jira request");
        let response = self
            .authorize(self.client.get(url))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AppError::TrackerError(format!("Request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(AppError::NotFound(format!("Issue {} not found", key))),
            status if !status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                Err(AppError::TrackerError(format!("API error ({}): {}", status, text)))
            }
            _ => response
                .json()
                .await
                .map_err(|e| AppError::TrackerError(format!("Failed to parse JSON: {}", e))),
        }
    }

    async fn fetch_issue_json(&self, key: &str) -> Result<Value> {
        let mut url = self.api_url(&format!("rest/api/2/issue/{}", key))?;
        url.query_pairs_mut().append_pair("fields", ISSUE_FIELDS);
        self.get_json(url, key).await
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn fetch_issue(&self, key: &str) -> Result<IssueRecord> {
        let json = self.fetch_issue_json(key).await?;
        issue_from_json(&json)
    }

    async fn fetch_children(&self, epic_key: &str) -> Result<Vec<IssueRecord>> {
        let jql = children_jql(epic_key)?;
        let mut children = Vec::new();
        let mut start_at = 0u64;

        loop {
            let mut url = self.api_url("rest/api/2/search")?;
            url.query_pairs_mut()
                .append_pair("jql", &jql)
                .append_pair("fields", ISSUE_FIELDS)
                .append_pair("startAt", &start_at.to_string())
                .append_pair("maxResults", &SEARCH_PAGE_SIZE.to_string());

            let page = self.get_json(url, epic_key).await?;
            let issues = page["issues"].as_array().cloned().unwrap_or_default();
            let fetched = issues.len() as u64;
            for issue in &issues {
                match issue_from_json(issue) {
                    Ok(record) => children.push(record),
                    Err(err) => warn!(epic_key = %epic_key, error = %err, "Skipping malformed child issue"),
                }
            }

            let total = page["total"].as_u64().unwrap_or(0);
            start_at += fetched;
            if fetched == 0 || start_at >= total {
                break;
            }
        }

        debug!(epic_key = %epic_key, children = children.len(), "Fetched child issues");
        Ok(children)
    }

    async fn fetch_attachments(&self, key: &str) -> Result<Vec<AttachmentMeta>> {
        let json = self.fetch_issue_json(key).await?;
        Ok(attachments_from_json(&json))
    }

    async fn download_attachment(&self, attachment: &AttachmentMeta) -> Result<Vec<u8>> {
        let url = Url::parse(&attachment.content_url)
            .map_err(|e| AppError::TrackerError(format!("Invalid attachment URL: {}", e)))?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| AppError::TrackerError(format!("Download failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!(
                "Attachment {} not found",
                attachment.filename
            )));
        }
        if !response.status().is_success() {
            return Err(AppError::TrackerError(format!(
                "Download of {} failed ({})",
                attachment.filename,
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| AppError::TrackerError(format!("Download failed: {}", e)))
    }
}

/// Children of an epic, by parent link or legacy "Epic Link".
pub(crate) fn children_jql(epic_key: &str) -> Result<String> {
    if !is_issue_key(epic_key) {
        return Err(AppError::ValidationError(format!(
            "Invalid issue key: {}",
            epic_key
        )));
    }
    Ok(format!(
        "parent = \"{key}\" OR \"Epic Link\" = \"{key}\" ORDER BY key ASC",
        key = epic_key
    ))
}

pub(crate) fn issue_from_json(json: &Value) -> Result<IssueRecord> {
    let key = json["key"]
        .as_str()
        .ok_or_else(|| AppError::ParseError("Issue payload has no key".to_string()))?;
    let fields = &json["fields"];

    Ok(IssueRecord {
        key: key.to_string(),
        summary: fields["summary"].as_str().unwrap_or_default().to_string(),
        description: description_text(&fields["description"]),
        issue_type: fields["issuetype"]["name"]
            .as_str()
            .unwrap_or("Unknown")
            .to_string(),
        status: fields["status"]["name"].as_str().map(str::to_string),
        labels: fields["labels"]
            .as_array()
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        parent_key: fields["parent"]["key"].as_str().map(str::to_string),
    })
}

pub(crate) fn attachments_from_json(json: &Value) -> Vec<AttachmentMeta> {
    json["fields"]["attachment"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(AttachmentMeta {
                        id: item["id"].as_str()?.to_string(),
                        filename: item["filename"].as_str()?.to_string(),
                        mime_type: item["mimeType"].as_str().map(str::to_string),
                        size: item["size"].as_u64().unwrap_or(0),
                        content_url: item["content"].as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// v2 returns wiki text, v3 returns an Atlassian document tree.
fn description_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Object(_) => {
            let mut buffer = String::new();
            flatten_document(value, &mut buffer);
            buffer
        }
        _ => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn flatten_document(node: &Value, buffer: &mut String) {
    if let Some(text) = node["text"].as_str() {
        buffer.push_str(text);
    }
    if let Some(children) = node["content"].as_array() {
        for child in children {
            flatten_document(child, buffer);
        }
    }
    if matches!(
        node["type"].as_str(),
        Some("paragraph" | "heading" | "listItem" | "hardBreak")
    ) {
        buffer.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn children_jql_quotes_key_and_rejects_injection() {
        assert_eq!(
            children_jql("QA-1").unwrap(),
            r#"parent = "QA-1" OR "Epic Link" = "QA-1" ORDER BY key ASC"#
        );
        let err = children_jql("QA-1 OR project = SEC").unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn parses_issue_fields() {
        let payload = json!({
            "key": "QA-7",
            "fields": {
                "summary": "Checkout flow",
                "description": "Users pay with card",
                "issuetype": {"name": "Story"},
                "status": {"name": "In Progress"},
                "labels": ["payments", "web"],
                "parent": {"key": "QA-1"}
            }
        });
        let issue = issue_from_json(&payload).unwrap();
        assert_eq!(issue.key, "QA-7");
        assert_eq!(issue.issue_type, "Story");
        assert_eq!(issue.status.as_deref(), Some("In Progress"));
        assert_eq!(issue.labels, vec!["payments", "web"]);
        assert_eq!(issue.parent_key.as_deref(), Some("QA-1"));
        assert_eq!(issue.description.as_deref(), Some("Users pay with card"));
    }

    #[test]
    fn flattens_document_descriptions() {
        let payload = json!({
            "key": "QA-8",
            "fields": {
                "summary": "Refunds",
                "issuetype": {"name": "Epic"},
                "description": {
                    "type": "doc",
                    "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "Refund within 30 days"}]},
                        {"type": "paragraph", "content": [{"type": "text", "text": "Partial refunds allowed"}]}
                    ]
                }
            }
        });
        let issue = issue_from_json(&payload).unwrap();
        assert_eq!(
            issue.description.as_deref(),
            Some("Refund within 30 days\nPartial refunds allowed")
        );
        assert!(issue.labels.is_empty());
    }

    #[test]
    fn missing_key_is_parse_error() {
        let err = issue_from_json(&json!({"fields": {}})).unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }

    #[test]
    fn parses_attachments_and_skips_incomplete_entries() {
        let payload = json!({
            "key": "QA-1",
            "fields": {
                "attachment": [
                    {"id": "10", "filename": "requirements.pdf", "mimeType": "application/pdf", "size": 2048,
                     "content": "https://jira.example.com/secure/attachment/10/requirements.pdf"},
                    {"id": "11", "filename": "broken.txt"}
                ]
            }
        });
        let attachments = attachments_from_json(&payload);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "requirements.pdf");
        assert_eq!(attachments[0].size, 2048);
        assert!(attachments_from_json(&json!({"fields": {}})).is_empty());
    }

    #[test]
    fn api_url_joins_base_with_or_without_slash() {
        let mut settings = JiraSettings::default();
        settings.base_url = "https://jira.example.com".to_string();
        let client = JiraClient::new(settings.clone());
        assert_eq!(
            client.api_url("rest/api/2/issue/QA-1").unwrap().as_str(),
            "https://jira.example.com/rest/api/2/issue/QA-1"
        );

        settings.base_url = "https://example.com/jira/".to_string();
        let client = JiraClient::new(settings);
        assert_eq!(
            client.api_url("rest/api/2/search").unwrap().as_str(),
            "https://example.com/jira/rest/api/2/search"
        );
    }
}
