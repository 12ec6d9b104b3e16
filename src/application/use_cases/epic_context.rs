use crate::domain::error::{AppError, Result};
use crate::domain::issue::{is_issue_key, IssueRecord, ProcessedAttachment};
use crate::infrastructure::extraction::DocumentExtractor;
use crate::infrastructure::store::{ChildAttachments, DocumentCache};
use crate::infrastructure::tracker::IssueTracker;
use crate::shared::TokenCounter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpicContext {
    pub epic: IssueRecord,
    pub children: Vec<IssueRecord>,
    pub epic_attachments: Vec<ProcessedAttachment>,
    pub child_attachments: ChildAttachments,
    pub from_cache: bool,
}

impl EpicContext {
    pub fn attachment_count(&self) -> usize {
        self.epic_attachments.len() + self.child_attachments.values().map(Vec::len).sum::<usize>()
    }

    /// Plain-text rendering of the epic, its stories and attachment text, cut to `token_budget`.
    pub fn to_prompt_context(&self, token_budget: usize) -> String {
        let mut body = String::new();
        body.push_str(&format!("Epic {}: {}\n", self.epic.key, self.epic.summary));
        if let Some(description) = self.epic.description.as_deref() {
            body.push_str(&format!("Description:\n{}\n", description));
        }
        if !self.epic.labels.is_empty() {
            body.push_str(&format!("Labels: {}\n", self.epic.labels.join(", ")));
        }

        if !self.children.is_empty() {
            body.push_str("\nStories:\n");
            for child in &self.children {
                body.push_str(&format!(
                    "- {} [{}] {}\n",
                    child.key, child.issue_type, child.summary
                ));
                if let Some(description) = child.description.as_deref() {
                    for line in description.lines().filter(|l| !l.trim().is_empty()) {
                        body.push_str(&format!("    {}\n", line.trim()));
                    }
                }
            }
        }

        let mut attachments: Vec<(&str, &ProcessedAttachment)> = self
            .epic_attachments
            .iter()
            .map(|a| (self.epic.key.as_str(), a))
            .collect();
        for (key, items) in &self.child_attachments {
            attachments.extend(items.iter().map(|a| (key.as_str(), a)));
        }
        if !attachments.is_empty() {
            body.push_str("\nAttachments:\n");
            for (key, attachment) in attachments {
                body.push_str(&format!("\n--- {} ({}) ---\n", attachment.filename, key));
                body.push_str(&attachment.text);
                body.push('\n');
            }
        }

        let (mut text, truncated) = TokenCounter::truncate_to_budget(&body, token_budget);
        if truncated {
            text.push_str("\n[context truncated]\n");
        }
        text
    }
}

/// Loads an epic with its stories and extracted attachment text.
pub struct EpicContextUseCase {
    tracker: Arc<dyn IssueTracker + Send + Sync>,
    extractor: Arc<dyn DocumentExtractor>,
    cache: Arc<DocumentCache>,
}

impl EpicContextUseCase {
    pub fn new(
        tracker: Arc<dyn IssueTracker + Send + Sync>,
        extractor: Arc<dyn DocumentExtractor>,
        cache: Arc<DocumentCache>,
    ) -> Self {
        Self {
            tracker,
            extractor,
            cache,
        }
    }

    /// Issue data is always fetched live; attachment text comes from the document
    /// cache when present. `refresh` drops the cached entry first.
    pub async fn load(&self, epic_key: &str, refresh: bool) -> Result<EpicContext> {
        let epic_key = epic_key.trim();
        if epic_key.is_empty() {
            return Err(AppError::ValidationError("Epic key is required.".to_string()));
        }
        if !is_issue_key(epic_key) {
            return Err(AppError::ValidationError(format!(
                "Invalid epic key: {}",
                epic_key
            )));
        }
        if refresh {
            self.cache.invalidate(Some(epic_key));
        }

        let epic = self.tracker.fetch_issue(epic_key).await?;
        let children = self.tracker.fetch_children(epic_key).await?;

        if let Some(cached) = self.cache.fetch(epic_key) {
            debug!(epic_key = %epic_key, "Using cached attachment text");
            return Ok(EpicContext {
                epic,
                children,
                epic_attachments: cached.epic_attachments,
                child_attachments: cached.child_attachments,
                from_cache: true,
            });
        }

        let epic_attachments = self.process_attachments(epic_key).await;
        let mut child_attachments = ChildAttachments::new();
        for child in &children {
            let processed = self.process_attachments(&child.key).await;
            if !processed.is_empty() {
                child_attachments.insert(child.key.clone(), processed);
            }
        }
        self.cache
            .store(epic_key, epic_attachments.clone(), child_attachments.clone());

        info!(
            epic_key = %epic_key,
            children = children.len(),
            epic_attachments = epic_attachments.len(),
            child_issues_with_attachments = child_attachments.len(),
            "Epic context loaded"
        );
        Ok(EpicContext {
            epic,
            children,
            epic_attachments,
            child_attachments,
            from_cache: false,
        })
    }

    async fn process_attachments(&self, issue_key: &str) -> Vec<ProcessedAttachment> {
        let attachments = match self.tracker.fetch_attachments(issue_key).await {
            Ok(attachments) => attachments,
            Err(err) => {
                warn!(issue_key = %issue_key, error = %err, "Failed to list attachments");
                return Vec::new();
            }
        };

        let mut processed = Vec::with_capacity(attachments.len());
        for attachment in &attachments {
            let bytes = match self.tracker.download_attachment(attachment).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(
                        issue_key = %issue_key,
                        filename = %attachment.filename,
                        error = %err,
                        "Skipping attachment that failed to download"
                    );
                    continue;
                }
            };
            match self.extractor.extract_text(attachment, &bytes) {
                Ok(item) => processed.push(item),
                Err(AppError::UnsupportedFormat(reason)) => {
                    debug!(issue_key = %issue_key, reason = %reason, "Skipping unsupported attachment");
                }
                Err(err) => {
                    warn!(
                        issue_key = %issue_key,
                        filename = %attachment.filename,
                        error = %err,
                        "Skipping attachment that failed to extract"
                    );
                }
            }
        }
        processed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::issue::AttachmentMeta;
    use crate::shared::ManualClock;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn issue(key: &str, summary: &str, parent: Option<&str>) -> IssueRecord {
        IssueRecord {
            key: key.to_string(),
            summary: summary.to_string(),
            description: Some(format!("{} description", summary)),
            issue_type: if parent.is_some() { "Story" } else { "Epic" }.to_string(),
            status: None,
            labels: Vec::new(),
            parent_key: parent.map(str::to_string),
        }
    }

    fn attachment(id: &str, filename: &str) -> AttachmentMeta {
        AttachmentMeta {
            id: id.to_string(),
            filename: filename.to_string(),
            mime_type: None,
            size: 10,
            content_url: format!("https://jira.example.com/attachment/{}", id),
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeTracker {
        pub issues: HashMap<String, IssueRecord>,
        pub children: Vec<IssueRecord>,
        pub attachments: HashMap<String, Vec<AttachmentMeta>>,
        pub attachment_calls: AtomicUsize,
        pub download_calls: AtomicUsize,
    }

    impl FakeTracker {
        pub(crate) fn with_epic() -> Self {
            let mut tracker = FakeTracker::default();
            tracker
                .issues
                .insert("QA-1".to_string(), issue("QA-1", "Checkout", None));
            tracker.children = vec![
                issue("QA-2", "Pay by card", Some("QA-1")),
                issue("QA-3", "Pay by voucher", Some("QA-1")),
            ];
            tracker.attachments.insert(
                "QA-1".to_string(),
                vec![attachment("10", "rules.txt"), attachment("11", "mockup.png")],
            );
            tracker
                .attachments
                .insert("QA-2".to_string(), vec![attachment("12", "card.md")]);
            tracker
        }
    }

    #[async_trait]
    impl IssueTracker for FakeTracker {
        async fn fetch_issue(&self, key: &str) -> Result<IssueRecord> {
            self.issues
                .get(key)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", key)))
        }

        async fn fetch_children(&self, _epic_key: &str) -> Result<Vec<IssueRecord>> {
            Ok(self.children.clone())
        }

        async fn fetch_attachments(&self, key: &str) -> Result<Vec<AttachmentMeta>> {
            self.attachment_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.attachments.get(key).cloned().unwrap_or_default())
        }

        async fn download_attachment(&self, attachment: &AttachmentMeta) -> Result<Vec<u8>> {
            self.download_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("contents of {}", attachment.filename).into_bytes())
        }
    }

    fn build(tracker: Arc<FakeTracker>) -> (EpicContextUseCase, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        let cache = Arc::new(DocumentCache::new(clock.clone(), Duration::hours(2)));
        let use_case = EpicContextUseCase::new(
            tracker,
            Arc::new(crate::infrastructure::extraction::LocalDocumentExtractor::default()),
            cache,
        );
        (use_case, clock)
    }

    #[tokio::test]
    async fn loads_epic_and_skips_unsupported_attachments() {
        let tracker = Arc::new(FakeTracker::with_epic());
        let (use_case, _clock) = build(tracker.clone());

        let context = use_case.load("QA-1", false).await.unwrap();
        assert!(!context.from_cache);
        assert_eq!(context.children.len(), 2);
        assert_eq!(context.epic_attachments.len(), 1);
        assert_eq!(context.epic_attachments[0].text, "contents of rules.txt");
        assert_eq!(context.child_attachments.len(), 1);
        assert_eq!(context.attachment_count(), 2);
    }

    #[tokio::test]
    async fn second_load_uses_cache_until_ttl() {
        let tracker = Arc::new(FakeTracker::with_epic());
        let (use_case, clock) = build(tracker.clone());

        use_case.load("QA-1", false).await.unwrap();
        let listings = tracker.attachment_calls.load(Ordering::SeqCst);
        let downloads = tracker.download_calls.load(Ordering::SeqCst);
        assert_eq!(listings, 3);

        let cached = use_case.load("QA-1", false).await.unwrap();
        assert!(cached.from_cache);
        assert_eq!(tracker.attachment_calls.load(Ordering::SeqCst), listings);
        assert_eq!(tracker.download_calls.load(Ordering::SeqCst), downloads);

        clock.advance(Duration::hours(2) + Duration::seconds(1));
        let reloaded = use_case.load("QA-1", false).await.unwrap();
        assert!(!reloaded.from_cache);
        assert_eq!(tracker.attachment_calls.load(Ordering::SeqCst), listings * 2);
    }

    #[tokio::test]
    async fn refresh_bypasses_cache() {
        let tracker = Arc::new(FakeTracker::with_epic());
        let (use_case, _clock) = build(tracker.clone());

        use_case.load("QA-1", false).await.unwrap();
        let refreshed = use_case.load("QA-1", true).await.unwrap();
        assert!(!refreshed.from_cache);
        assert_eq!(tracker.attachment_calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn unknown_epic_is_not_found() {
        let tracker = Arc::new(FakeTracker::with_epic());
        let (use_case, _clock) = build(tracker.clone());

        let err = use_case.load("QA-404", false).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = use_case.load("  ", false).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        let err = use_case
            .load("QA-1 OR project = SEC", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(tracker.attachment_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn prompt_context_respects_budget() {
        let tracker = Arc::new(FakeTracker::with_epic());
        let (use_case, _clock) = build(tracker);
        let context = use_case.load("QA-1", false).await.unwrap();

        let full = context.to_prompt_context(10_000);
        assert!(full.starts_with("Epic QA-1: Checkout"));
        assert!(full.contains("- QA-2 [Story] Pay by card"));
        assert!(full.contains("--- card.md (QA-2) ---"));

        let short = context.to_prompt_context(5);
        assert!(short.ends_with("[context truncated]\n"));
    }
}
