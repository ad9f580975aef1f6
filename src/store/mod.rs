// src/store/mod.rs
//! Deduplication store: per-namespace sets of delivered story identities with
//! a last-seen timestamp each.
//!
//! Every namespace has its own lock. The outer map is only write-locked when a
//! namespace is created or the whole store is restored, so a long eviction
//! sweep in one namespace never stalls `exists`/`insert` in another.

pub mod error;
pub mod persist;

pub use error::StoreError;

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

type Namespace = HashMap<String, DateTime<Utc>>;

/// Point-in-time copy of every namespace, ordered for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub namespaces: BTreeMap<String, BTreeMap<String, DateTime<Utc>>>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.namespaces.values().all(|ns| ns.is_empty())
    }

    /// Total number of records across namespaces.
    pub fn len(&self) -> usize {
        self.namespaces.values().map(|ns| ns.len()).sum()
    }
}

#[derive(Debug, Default)]
pub struct DedupStore {
    namespaces: RwLock<HashMap<String, Arc<Mutex<Namespace>>>>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, namespace: &str) -> Option<Arc<Mutex<Namespace>>> {
        self.namespaces.read().get(namespace).cloned()
    }

    fn get_or_create(&self, namespace: &str) -> Arc<Mutex<Namespace>> {
        if let Some(ns) = self.lookup(namespace) {
            return ns;
        }
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .clone()
    }

    /// Returns true if `key` was already recorded in `namespace`, refreshing its
    /// last-seen time. An absent key leaves the store untouched.
    pub fn exists(&self, namespace: &str, key: &str) -> bool {
        self.exists_at(namespace, key, Utc::now())
    }

    pub fn exists_at(&self, namespace: &str, key: &str, now: DateTime<Utc>) -> bool {
        let Some(ns) = self.lookup(namespace) else {
            return false;
        };
        let mut guard = ns.lock();
        match guard.get_mut(key) {
            Some(last_seen) => {
                *last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Record `key` as delivered. Calling it again only refreshes the timestamp.
    pub fn insert(&self, namespace: &str, key: &str) {
        self.insert_at(namespace, key, Utc::now());
    }

    pub fn insert_at(&self, namespace: &str, key: &str, now: DateTime<Utc>) {
        let ns = self.get_or_create(namespace);
        ns.lock().insert(key.to_string(), now);
    }

    /// Drop every record in `namespace` last seen strictly before `cutoff`.
    /// Returns how many records were removed.
    pub fn evict_before(&self, namespace: &str, cutoff: DateTime<Utc>) -> usize {
        let Some(ns) = self.lookup(namespace) else {
            return 0;
        };
        let mut guard = ns.lock();
        let before = guard.len();
        guard.retain(|_, last_seen| *last_seen >= cutoff);
        before - guard.len()
    }

    /// Number of records in `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.lookup(namespace).map(|ns| ns.lock().len()).unwrap_or(0)
    }

    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Copies namespaces one at a time; callers may keep using the store meanwhile.
    /// Timestamps are truncated to whole seconds, matching the persisted format.
    pub fn snapshot(&self) -> Snapshot {
        let shards: Vec<(String, Arc<Mutex<Namespace>>)> = self
            .namespaces
            .read()
            .iter()
            .map(|(name, ns)| (name.clone(), ns.clone()))
            .collect();

        let mut out = Snapshot::default();
        for (name, ns) in shards {
            let records = ns
                .lock()
                .iter()
                .map(|(key, ts)| (key.clone(), ts.trunc_subsecs(0)))
                .collect();
            out.namespaces.insert(name, records);
        }
        out
    }

    /// Replace the entire contents with `snapshot`.
    pub fn restore(&self, snapshot: Snapshot) {
        let rebuilt: HashMap<String, Arc<Mutex<Namespace>>> = snapshot
            .namespaces
            .into_iter()
            .map(|(name, records)| (name, Arc::new(Mutex::new(records.into_iter().collect()))))
            .collect();
        *self.namespaces.write() = rebuilt;
    }
}
