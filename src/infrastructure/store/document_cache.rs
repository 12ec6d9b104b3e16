use super::expiring::{EntryHandle, ExpiringStore, StoreStats};
use crate::domain::issue::ProcessedAttachment;
use crate::shared::Clock;
use chrono::Duration;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Default TTL in seconds (2 hours of extracted attachment text per epic)
pub const DEFAULT_DOCUMENT_CACHE_TTL_SECS: i64 = 2 * 60 * 60;

/// Extracted attachments per child issue key.
pub type ChildAttachments = BTreeMap<String, Vec<ProcessedAttachment>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedDocuments {
    pub epic_attachments: Vec<ProcessedAttachment>,
    pub child_attachments: ChildAttachments,
}

/// Extracted attachment text keyed by epic, so one workflow does not re-parse files.
pub struct DocumentCache {
    store: ExpiringStore<String, CachedDocuments>,
    ttl: Duration,
}

impl DocumentCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store: ExpiringStore::new(clock),
            ttl,
        }
    }

    pub fn with_default_ttl(clock: Arc<dyn Clock>) -> Self {
        Self::new(clock, Duration::seconds(DEFAULT_DOCUMENT_CACHE_TTL_SECS))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace the epic's entry wholesale and restart its TTL window.
    pub fn store(
        &self,
        epic_key: &str,
        epic_attachments: Vec<ProcessedAttachment>,
        child_attachments: ChildAttachments,
    ) -> EntryHandle {
        let child_count: usize = child_attachments.values().map(Vec::len).sum();
        debug!(
            epic_key = %epic_key,
            epic_attachments = epic_attachments.len(),
            child_attachments = child_count,
            "Caching processed attachments"
        );
        self.store.put(
            epic_key.to_string(),
            CachedDocuments {
                epic_attachments,
                child_attachments,
            },
            self.ttl,
        )
    }

    pub fn fetch(&self, epic_key: &str) -> Option<CachedDocuments> {
        let cached = self.store.get(epic_key);
        debug!(epic_key = %epic_key, hit = cached.is_some(), "Document cache lookup");
        cached
    }

    /// Drop one epic, or everything when `epic_key` is `None`. Returns entries removed.
    pub fn invalidate(&self, epic_key: Option<&str>) -> usize {
        let removed = match epic_key {
            Some(key) => usize::from(self.store.remove(key)),
            None => self.store.clear(),
        };
        info!(epic_key = ?epic_key, removed, "Document cache invalidated");
        removed
    }

    pub fn sweep(&self) -> usize {
        self.store.sweep()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ManualClock;

    fn attachment(name: &str, text: &str) -> ProcessedAttachment {
        ProcessedAttachment {
            attachment_id: name.to_string(),
            filename: name.to_string(),
            mime_type: Some("text/plain".to_string()),
            text: text.to_string(),
            char_count: text.len(),
            truncated: false,
        }
    }

    fn cache() -> (Arc<ManualClock>, DocumentCache) {
        let clock = Arc::new(ManualClock::default());
        let cache = DocumentCache::with_default_ttl(clock.clone());
        (clock, cache)
    }

    #[test]
    fn store_then_fetch_preserves_order() {
        let (_clock, cache) = cache();
        let mut children = ChildAttachments::new();
        children.insert(
            "QA-2".to_string(),
            vec![attachment("b.txt", "b"), attachment("a.txt", "a")],
        );
        cache.store("QA-1", vec![attachment("epic.txt", "epic")], children);

        let cached = cache.fetch("QA-1").expect("cached");
        assert_eq!(cached.epic_attachments[0].filename, "epic.txt");
        let names: Vec<_> = cached.child_attachments["QA-2"]
            .iter()
            .map(|a| a.filename.as_str())
            .collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
    }

    #[test]
    fn restore_overwrites_without_merge() {
        let (_clock, cache) = cache();
        let mut children = ChildAttachments::new();
        children.insert("QA-2".to_string(), vec![attachment("old.txt", "old")]);
        cache.store("QA-1", vec![attachment("one.txt", "1")], children);
        cache.store("QA-1", vec![attachment("two.txt", "2")], ChildAttachments::new());

        let cached = cache.fetch("QA-1").expect("cached");
        assert_eq!(cached.epic_attachments.len(), 1);
        assert_eq!(cached.epic_attachments[0].filename, "two.txt");
        assert!(cached.child_attachments.is_empty());
    }

    #[test]
    fn entry_expires_after_two_hours() {
        let (clock, cache) = cache();
        cache.store("QA-1", Vec::new(), ChildAttachments::new());
        clock.advance(Duration::hours(2));
        assert!(cache.fetch("QA-1").is_some());
        clock.advance(Duration::seconds(1));
        assert!(cache.fetch("QA-1").is_none());
        assert_eq!(cache.stats().total, 0);
    }

    #[test]
    fn invalidate_targeted_and_full() {
        let (_clock, cache) = cache();
        cache.store("QA-1", Vec::new(), ChildAttachments::new());
        cache.store("QA-9", Vec::new(), ChildAttachments::new());

        assert_eq!(cache.invalidate(Some("QA-1")), 1);
        assert_eq!(cache.invalidate(Some("QA-1")), 0);
        assert!(cache.fetch("QA-9").is_some());

        assert_eq!(cache.invalidate(None), 1);
        assert!(cache.fetch("QA-9").is_none());
    }
}
