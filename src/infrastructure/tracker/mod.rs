pub mod jira;

use crate::domain::error::Result;
use crate::domain::issue::{AttachmentMeta, IssueRecord};
use async_trait::async_trait;

pub use jira::JiraClient;

#[async_trait]
pub trait IssueTracker {
    /// Fails with `AppError::NotFound` when the key is unknown.
    async fn fetch_issue(&self, key: &str) -> Result<IssueRecord>;

    /// Child issues of an epic; empty when there are none.
    async fn fetch_children(&self, epic_key: &str) -> Result<Vec<IssueRecord>>;

    /// Attachment metadata for an issue; empty when there are none.
    async fn fetch_attachments(&self, key: &str) -> Result<Vec<AttachmentMeta>>;

    async fn download_attachment(&self, attachment: &AttachmentMeta) -> Result<Vec<u8>>;
}
