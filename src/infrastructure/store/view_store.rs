//! Named filter configurations per session, with at most one default view.
//!
//! Views have no TTL; they live until deleted or the session is cleared.
//! Every mutator keeps `default_view_id` pointing at an existing view or unset.

use crate::domain::view::{SavedView, ViewSummary, ViewUpdate};
use crate::shared::Clock;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct ViewSession {
    views: HashMap<String, SavedView>,
    default_view_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ViewStoreStats {
    pub sessions: usize,
    pub views: usize,
    pub sessions_with_default: usize,
}

pub struct ViewStore {
    sessions: Mutex<HashMap<String, ViewSession>>,
    clock: Arc<dyn Clock>,
}

impl ViewStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn save_view(
        &self,
        session_id: &str,
        name: &str,
        filters: Value,
        description: Option<String>,
        is_default: bool,
    ) -> String {
        let now = self.clock.now();
        let view_id = Uuid::new_v4().to_string();
        let view = SavedView {
            id: view_id.clone(),
            name: name.trim().to_string(),
            filters,
            description,
            created_at: now,
            updated_at: now,
        };

        let mut sessions = self.sessions.lock();
        let session = sessions.entry(session_id.to_string()).or_default();
        session.views.insert(view_id.clone(), view);
        if is_default {
            session.default_view_id = Some(view_id.clone());
        }
        debug!(session_id = %session_id, view_id = %view_id, is_default, "View saved");
        view_id
    }

    pub fn load_view(&self, session_id: &str, view_id: &str) -> Option<SavedView> {
        self.sessions
            .lock()
            .get(session_id)
            .and_then(|session| session.views.get(view_id).cloned())
    }

    /// Views sorted by name (case-insensitive), each flagged if it is the default.
    pub fn list_views(&self, session_id: &str) -> Vec<ViewSummary> {
        let sessions = self.sessions.lock();
        let Some(session) = sessions.get(session_id) else {
            return Vec::new();
        };

        let mut views: Vec<ViewSummary> = session
            .views
            .values()
            .map(|view| ViewSummary {
                is_default: session.default_view_id.as_deref() == Some(view.id.as_str()),
                view: view.clone(),
            })
            .collect();
        views.sort_by(|a, b| {
            a.view
                .name
                .to_lowercase()
                .cmp(&b.view.name.to_lowercase())
                .then_with(|| a.view.created_at.cmp(&b.view.created_at))
                .then_with(|| a.view.id.cmp(&b.view.id))
        });
        views
    }

    /// Apply only the supplied fields. False if the view does not exist.
    pub fn update_view(&self, session_id: &str, view_id: &str, update: ViewUpdate) -> bool {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        let Some(view) = sessions
            .get_mut(session_id)
            .and_then(|session| session.views.get_mut(view_id))
        else {
            return false;
        };

        if update.is_empty() {
            return true;
        }
        if let Some(name) = update.name {
            view.name = name.trim().to_string();
        }
        if let Some(filters) = update.filters {
            view.filters = filters;
        }
        if let Some(description) = update.description {
            view.description = Some(description);
        }
        view.updated_at = now;
        true
    }

    /// Remove a view, clearing the default pointer in the same critical section.
    pub fn delete_view(&self, session_id: &str, view_id: &str) -> bool {
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(session_id) else {
            return false;
        };
        if session.views.remove(view_id).is_none() {
            return false;
        }
        if session.default_view_id.as_deref() == Some(view_id) {
            session.default_view_id = None;
            debug!(session_id = %session_id, view_id = %view_id, "Default view deleted, pointer cleared");
        }
        true
    }

    /// Point the default at `view_id`, or clear it with `None`.
    ///
    /// Fails when the session is unknown or the target view is not in it.
    pub fn set_default_view(&self, session_id: &str, view_id: Option<&str>) -> bool {
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(session_id) else {
            return false;
        };
        match view_id {
            Some(id) if !session.views.contains_key(id) => false,
            Some(id) => {
                session.default_view_id = Some(id.to_string());
                true
            }
            None => {
                session.default_view_id = None;
                true
            }
        }
    }

    pub fn get_default_view(&self, session_id: &str) -> Option<SavedView> {
        let sessions = self.sessions.lock();
        let session = sessions.get(session_id)?;
        let default_id = session.default_view_id.as_deref()?;
        session.views.get(default_id).cloned()
    }

    pub fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.lock().remove(session_id).is_some()
    }

    pub fn stats(&self) -> ViewStoreStats {
        let sessions = self.sessions.lock();
        ViewStoreStats {
            sessions: sessions.len(),
            views: sessions.values().map(|session| session.views.len()).sum(),
            sessions_with_default: sessions
                .values()
                .filter(|session| session.default_view_id.is_some())
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ManualClock;
    use chrono::Duration;
    use proptest::prelude::*;
    use serde_json::json;

    fn store() -> (Arc<ManualClock>, ViewStore) {
        let clock = Arc::new(ManualClock::default());
        let store = ViewStore::new(clock.clone());
        (clock, store)
    }

    fn default_is_valid(store: &ViewStore, session_id: &str) -> bool {
        let sessions = store.sessions.lock();
        match sessions.get(session_id) {
            Some(session) => session
                .default_view_id
                .as_ref()
                .map_or(true, |id| session.views.contains_key(id)),
            None => true,
        }
    }

    #[test]
    fn deleting_default_view_clears_pointer() {
        let (_clock, store) = store();
        let id = store.save_view("s1", "My View", json!({"status": "open"}), None, true);
        assert_eq!(store.get_default_view("s1").map(|v| v.id), Some(id.clone()));

        assert!(store.delete_view("s1", &id));
        assert!(store.get_default_view("s1").is_none());
        assert!(default_is_valid(&store, "s1"));
    }

    #[test]
    fn deleting_other_view_keeps_default() {
        let (_clock, store) = store();
        let keep = store.save_view("s1", "Keep", json!({}), None, true);
        let other = store.save_view("s1", "Other", json!({}), None, false);
        assert!(store.delete_view("s1", &other));
        assert_eq!(store.get_default_view("s1").map(|v| v.id), Some(keep));
        assert!(!store.delete_view("s1", &other));
        assert!(!store.delete_view("ghost", &other));
    }

    #[test]
    fn saving_new_default_moves_pointer() {
        let (_clock, store) = store();
        let first = store.save_view("s1", "First", json!({}), None, true);
        let second = store.save_view("s1", "Second", json!({}), None, true);

        let listed = store.list_views("s1");
        let defaults: Vec<_> = listed.iter().filter(|v| v.is_default).map(|v| &v.view.id).collect();
        assert_eq!(defaults, vec![&second]);
        assert_ne!(first, second);
    }

    #[test]
    fn list_sorts_by_name_case_insensitively() {
        let (_clock, store) = store();
        store.save_view("s1", "beta", json!({}), None, false);
        store.save_view("s1", "Alpha", json!({}), None, false);
        store.save_view("s1", "Gamma", json!({}), None, true);

        let names: Vec<_> = store
            .list_views("s1")
            .into_iter()
            .map(|v| (v.view.name, v.is_default))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Alpha".to_string(), false),
                ("beta".to_string(), false),
                ("Gamma".to_string(), true),
            ]
        );
        assert!(store.list_views("unknown").is_empty());
    }

    #[test]
    fn update_changes_only_supplied_fields() {
        let (clock, store) = store();
        let id = store.save_view(
            "s1",
            "Open bugs",
            json!({"type": "bug"}),
            Some("All open bugs".to_string()),
            false,
        );
        clock.advance(Duration::seconds(30));

        assert!(store.update_view(
            "s1",
            &id,
            ViewUpdate {
                filters: Some(json!({"type": "bug", "priority": "high"})),
                ..ViewUpdate::default()
            },
        ));

        let view = store.load_view("s1", &id).expect("view");
        assert_eq!(view.name, "Open bugs");
        assert_eq!(view.description.as_deref(), Some("All open bugs"));
        assert_eq!(view.filters["priority"], "high");
        assert_eq!(view.updated_at - view.created_at, Duration::seconds(30));

        assert!(!store.update_view("s1", "missing", ViewUpdate::default()));
    }

    #[test]
    fn set_default_validates_target() {
        let (_clock, store) = store();
        assert!(!store.set_default_view("s1", None));

        let id = store.save_view("s1", "View", json!({}), None, false);
        assert!(!store.set_default_view("s1", Some("not-a-view")));
        assert!(store.get_default_view("s1").is_none());

        assert!(store.set_default_view("s1", Some(&id)));
        assert_eq!(store.get_default_view("s1").map(|v| v.id), Some(id));

        assert!(store.set_default_view("s1", None));
        assert!(store.get_default_view("s1").is_none());
    }

    #[test]
    fn views_are_isolated_per_session() {
        let (_clock, store) = store();
        let id = store.save_view("s1", "Mine", json!({}), None, true);
        assert!(store.load_view("s2", &id).is_none());
        assert!(!store.set_default_view("s2", Some(&id)));
        assert!(store.clear_session("s1"));
        assert!(store.load_view("s1", &id).is_none());
        assert_eq!(store.stats(), ViewStoreStats::default());
    }

    #[derive(Debug, Clone)]
    enum ViewOp {
        Save { name: u8, is_default: bool },
        Delete { pick: usize },
        SetDefault { pick: Option<usize> },
        Rename { pick: usize, name: u8 },
        Clear,
    }

    fn view_op() -> impl Strategy<Value = ViewOp> {
        prop_oneof![
            4 => (any::<u8>(), any::<bool>())
                .prop_map(|(name, is_default)| ViewOp::Save { name, is_default }),
            3 => any::<usize>().prop_map(|pick| ViewOp::Delete { pick }),
            2 => proptest::option::of(any::<usize>()).prop_map(|pick| ViewOp::SetDefault { pick }),
            1 => (any::<usize>(), any::<u8>()).prop_map(|(pick, name)| ViewOp::Rename { pick, name }),
            1 => Just(ViewOp::Clear),
        ]
    }

    #[test]
    fn concurrent_writers_keep_default_valid() {
        let (_clock, store) = store();
        std::thread::scope(|scope| {
            for worker in 0..8u32 {
                let store = &store;
                scope.spawn(move || {
                    let session_id = format!("s{}", worker % 4);
                    for i in 0..20u32 {
                        let id = store.save_view(
                            &session_id,
                            &format!("w{}-{}", worker, i),
                            json!({ "i": i }),
                            None,
                            i % 3 == 0,
                        );
                        if i % 5 == 0 {
                            assert!(store.delete_view(&session_id, &id));
                        }
                        store.list_views(&session_id);
                    }
                });
            }
        });

        let stats = store.stats();
        assert_eq!(stats.sessions, 4);
        assert_eq!(stats.views, 128);
        for session in 0..4 {
            let session_id = format!("s{}", session);
            assert_eq!(store.list_views(&session_id).len(), 32);
            assert!(default_is_valid(&store, &session_id));
        }
    }

    proptest! {
        #[test]
        fn prop_default_view_never_dangles(ops in proptest::collection::vec(view_op(), 1..60)) {
            let (_clock, store) = store();
            // ids ever created, including deleted ones, so stale ids get exercised
            let mut known: Vec<String> = Vec::new();

            for op in ops {
                match op {
                    ViewOp::Save { name, is_default } => {
                        known.push(store.save_view("s", &format!("v{name}"), json!({}), None, is_default));
                    }
                    ViewOp::Delete { pick } if !known.is_empty() => {
                        store.delete_view("s", &known[pick % known.len()]);
                    }
                    ViewOp::SetDefault { pick: Some(pick) } if !known.is_empty() => {
                        store.set_default_view("s", Some(&known[pick % known.len()]));
                    }
                    ViewOp::SetDefault { pick: None } => {
                        store.set_default_view("s", None);
                    }
                    ViewOp::Rename { pick, name } if !known.is_empty() => {
                        store.update_view(
                            "s",
                            &known[pick % known.len()],
                            ViewUpdate { name: Some(format!("r{name}")), ..ViewUpdate::default() },
                        );
                    }
                    ViewOp::Clear => {
                        store.clear_session("s");
                    }
                    _ => {}
                }

                prop_assert!(default_is_valid(&store, "s"));
                let defaults = store.list_views("s").iter().filter(|v| v.is_default).count();
                prop_assert!(defaults <= 1);
                prop_assert_eq!(defaults == 1, store.get_default_view("s").is_some());
            }
        }
    }
}
