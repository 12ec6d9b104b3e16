//! Generic TTL map guarded by a single lock.
//!
//! Expiry is lazy: a read that finds a dead entry deletes it and reports absence.
//! `sweep` exists only to bound memory and is never needed for correct reads.

use crate::shared::Clock;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ExpiringEntry<V> {
    pub value: V,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<V> ExpiringEntry<V> {
    /// Live iff `now <= expires_at`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// `start + ttl`, saturating at the latest representable instant.
pub fn expiry_after(start: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    start
        .checked_add_signed(ttl)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Timestamps of a freshly written entry.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntryHandle {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
}

pub struct ExpiringStore<K, V> {
    entries: Mutex<HashMap<K, ExpiringEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Insert or replace `key`, starting a fresh TTL window.
    pub fn put(&self, key: K, value: V, ttl: Duration) -> EntryHandle {
        let created_at = self.clock.now();
        let expires_at = expiry_after(created_at, ttl);
        self.entries.lock().insert(
            key,
            ExpiringEntry {
                value,
                created_at,
                expires_at,
            },
        );
        EntryHandle {
            created_at,
            expires_at,
        }
    }

    /// Live value for `key`, deleting the entry if it has expired.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Like [`get`](Self::get) but also returns the entry timestamps.
    pub fn get_entry<Q>(&self, key: &Q) -> Option<ExpiringEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let live = entries.get(key).map(|entry| entry.is_live(now))?;
        if live {
            return entries.get(key).cloned();
        }
        entries.remove(key);
        debug!("Expired entry removed on read");
        None
    }

    /// Delete `key` whether live or not. Returns true if something was there.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.lock().remove(key).is_some()
    }

    /// Delete every expired entry and return how many went.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();
        if removed > 0 {
            info!(removed, "Swept expired entries");
        }
        removed
    }

    pub fn stats(&self) -> StoreStats {
        let now = self.clock.now();
        let entries = self.entries.lock();
        let active = entries.values().filter(|entry| entry.is_live(now)).count();
        StoreStats {
            total: entries.len(),
            active,
            expired: entries.len() - active,
        }
    }

    /// Drop everything. Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Raw entry count, expired entries included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
