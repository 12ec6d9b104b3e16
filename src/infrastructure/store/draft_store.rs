//! Per-session drafts of in-progress workflow data.
//!
//! Two independent expiry clocks:
//! - each draft expires `draft_ttl` after it was saved; updates never extend it
//! - a whole session is dropped by `cleanup_expired` once idle for `session_idle`

use super::expiring::expiry_after;
use crate::domain::draft::{Draft, DraftDataType, DraftMetadata, DraftSummary};
use crate::shared::Clock;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Default draft TTL in seconds (24 hours)
pub const DEFAULT_DRAFT_TTL_SECS: i64 = 24 * 60 * 60;
/// Default idle window before a whole session is purged (7 days)
pub const DEFAULT_SESSION_IDLE_SECS: i64 = 7 * 24 * 60 * 60;

struct DraftSession {
    drafts: HashMap<String, Draft>,
    last_accessed: DateTime<Utc>,
}

impl DraftSession {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            drafts: HashMap::new(),
            last_accessed: now,
        }
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.drafts.len();
        self.drafts.retain(|_, draft| !draft.is_expired(now));
        before - self.drafts.len()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DraftStoreStats {
    pub sessions: usize,
    pub drafts: usize,
    pub expired_drafts: usize,
}

pub struct DraftStore {
    sessions: Mutex<HashMap<String, DraftSession>>,
    clock: Arc<dyn Clock>,
    draft_ttl: Duration,
    session_idle: Duration,
}

impl DraftStore {
    pub fn new(clock: Arc<dyn Clock>, draft_ttl: Duration, session_idle: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            draft_ttl,
            session_idle,
        }
    }

    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            clock,
            Duration::seconds(DEFAULT_DRAFT_TTL_SECS),
            Duration::seconds(DEFAULT_SESSION_IDLE_SECS),
        )
    }

    /// Always creates a new draft; the session is created on first save.
    pub fn save_draft(
        &self,
        session_id: &str,
        data_type: DraftDataType,
        data: Value,
        metadata: Option<DraftMetadata>,
    ) -> String {
        let now = self.clock.now();
        let draft_id = Uuid::new_v4().to_string();
        let draft = Draft {
            id: draft_id.clone(),
            data_type,
            data,
            metadata: metadata.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            expires_at: expiry_after(now, self.draft_ttl),
        };

        let mut sessions = self.sessions.lock();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| DraftSession::new(now));
        session.last_accessed = now;
        debug!(
            session_id = %session_id,
            draft_id = %draft_id,
            data_type = %draft.data_type.as_str(),
            "Draft saved"
        );
        session.drafts.insert(draft_id.clone(), draft);
        draft_id
    }

    pub fn load_draft(&self, session_id: &str, draft_id: &str) -> Option<Draft> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(session_id)?;
        let expired = session.drafts.get(draft_id)?.is_expired(now);
        if expired {
            session.drafts.remove(draft_id);
            debug!(session_id = %session_id, draft_id = %draft_id, "Expired draft removed on load");
            return None;
        }
        session.last_accessed = now;
        session.drafts.get(draft_id).cloned()
    }

    /// Live drafts of a session, newest `updated_at` first, without payloads.
    pub fn list_drafts(
        &self,
        session_id: &str,
        data_type: Option<&DraftDataType>,
    ) -> Vec<DraftSummary> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(session_id) else {
            return Vec::new();
        };
        session.purge_expired(now);

        let mut summaries: Vec<DraftSummary> = session
            .drafts
            .values()
            .filter(|draft| data_type.map_or(true, |wanted| &draft.data_type == wanted))
            .map(Draft::summary)
            .collect();
        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        summaries
    }

    /// Replace the payload and shallow-merge metadata. `expires_at` is left alone.
    pub fn update_draft(
        &self,
        session_id: &str,
        draft_id: &str,
        data: Value,
        metadata: Option<DraftMetadata>,
    ) -> bool {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(session_id) else {
            return false;
        };
        let Some(draft) = session.drafts.get_mut(draft_id) else {
            return false;
        };
        if draft.is_expired(now) {
            session.drafts.remove(draft_id);
            debug!(session_id = %session_id, draft_id = %draft_id, "Expired draft removed on update");
            return false;
        }

        draft.data = data;
        if let Some(extra) = metadata {
            draft.metadata.extend(extra);
        }
        draft.updated_at = now;
        session.last_accessed = now;
        true
    }

    pub fn delete_draft(&self, session_id: &str, draft_id: &str) -> bool {
        self.sessions
            .lock()
            .get_mut(session_id)
            .map_or(false, |session| session.drafts.remove(draft_id).is_some())
    }

    pub fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.lock().remove(session_id).is_some()
    }

    pub fn session_exists(&self, session_id: &str) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    /// Purge idle sessions, then expired drafts in the survivors.
    ///
    /// Each purged session counts as one item, each expired draft in a surviving
    /// session as one more.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();

        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_accessed <= self.session_idle);
        let purged_sessions = before - sessions.len();

        let purged_drafts: usize = sessions
            .values_mut()
            .map(|session| session.purge_expired(now))
            .sum();

        let removed = purged_sessions + purged_drafts;
        if removed > 0 {
            info!(
                purged_sessions,
                purged_drafts, "Draft store cleanup removed expired items"
            );
        }
        removed
    }

    pub fn stats(&self) -> DraftStoreStats {
        let now = self.clock.now();
        let sessions = self.sessions.lock();
        let mut stats = DraftStoreStats {
            sessions: sessions.len(),
            ..DraftStoreStats::default()
        };
        for draft in sessions.values().flat_map(|session| session.drafts.values()) {
            stats.drafts += 1;
            if draft.is_expired(now) {
                stats.expired_drafts += 1;
            }
        }
        stats
    }
}
