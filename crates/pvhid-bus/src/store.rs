//! Hierarchical key/value configuration store with transactions and
//! watches.
//!
//! Keys are addressed as a directory path plus a leaf name; values are
//! strings (numeric values are decimal-encoded by convention). Writes made
//! inside a transaction are buffered and become visible atomically on
//! commit; a commit that lost a race against a conflicting write reports
//! [`Commit::Retry`] and the caller re-runs the whole transaction.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such key: {0}")]
    NotFound(String),

    #[error("unknown transaction handle")]
    BadTransaction,

    #[error("store is shut down")]
    Closed,
}

/// Result of ending a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// All buffered writes are now visible.
    Committed,
    /// A conflicting write landed since the transaction started; nothing
    /// was applied. Re-run the transaction.
    Retry,
    /// The transaction was abandoned; nothing was applied.
    Aborted,
}

/// Opaque transaction handle returned by [`Store::transaction_start`].
#[derive(Debug)]
pub struct Transaction {
    pub(crate) id: u64,
}

/// A registered watch on a single key. The event is signalled once on
/// registration (so the first wait observes the current value) and then on
/// every write to the key.
#[derive(Clone)]
pub struct Watch {
    pub(crate) id: u64,
    event: Arc<WatchEvent>,
}

impl Watch {
    /// Wait until the watch fires or `timeout` elapses. Returns whether the
    /// event was signalled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut signalled = self.event.signalled.lock().unwrap();
        if !*signalled {
            let (guard, _) = self
                .event
                .condvar
                .wait_timeout(signalled, timeout)
                .unwrap();
            signalled = guard;
        }
        *signalled
    }

    pub fn clear(&self) {
        *self.event.signalled.lock().unwrap() = false;
    }
}

struct WatchEvent {
    signalled: Mutex<bool>,
    condvar: Condvar,
}

impl WatchEvent {
    fn signal(&self) {
        *self.signalled.lock().unwrap() = true;
        self.condvar.notify_all();
    }
}

pub trait Store: Send + Sync {
    fn read(&self, txn: Option<&Transaction>, path: &str, key: &str)
        -> Result<String, StoreError>;

    fn write(
        &self,
        txn: Option<&Transaction>,
        path: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    fn watch(&self, path: &str, key: &str) -> Result<Watch, StoreError>;

    fn unwatch(&self, watch: Watch);

    /// Pump the store transport. Watch events may not be delivered
    /// autonomously at elevated contexts, so bounded waits interleave this
    /// with short sleeps.
    fn poll(&self) {}

    fn transaction_start(&self) -> Result<Transaction, StoreError>;

    fn transaction_end(&self, txn: Transaction, commit: bool) -> Result<Commit, StoreError>;
}

struct TxnState {
    start_generation: u64,
    writes: Vec<(String, String)>,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<String, String>,
    /// Per-key generation of the last committed write, used for conflict
    /// detection.
    modified: HashMap<String, u64>,
    generation: u64,
    watches: Vec<(u64, String, Arc<WatchEvent>)>,
    transactions: HashMap<u64, TxnState>,
    next_id: u64,
    forced_retries: u32,
}

/// In-process store implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

fn full_key(path: &str, key: &str) -> String {
    format!("{path}/{key}")
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits report [`Commit::Retry`] regardless of
    /// conflicts. Lets tests exercise the caller's retry loop.
    pub fn force_retries(&self, count: u32) {
        self.inner.lock().unwrap().forced_retries = count;
    }

    /// Read without a path split, for test assertions on raw keys.
    pub fn get(&self, path: &str, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .get(&full_key(path, key))
            .cloned()
    }

    /// Remove a key, firing watches. Used by scripted backends to model a
    /// backend tearing its directory down.
    pub fn remove(&self, path: &str, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        let full = full_key(path, key);
        inner.entries.remove(&full);
        let generation = inner.generation + 1;
        inner.generation = generation;
        inner.modified.insert(full.clone(), generation);
        fire_watches(&inner, &full);
    }
}

fn fire_watches(inner: &StoreInner, full: &str) {
    for (_, watched, event) in &inner.watches {
        if watched == full {
            event.signal();
        }
    }
}

impl Store for MemoryStore {
    fn read(
        &self,
        txn: Option<&Transaction>,
        path: &str,
        key: &str,
    ) -> Result<String, StoreError> {
        let inner = self.inner.lock().unwrap();
        let full = full_key(path, key);
        if let Some(txn) = txn {
            let state = inner
                .transactions
                .get(&txn.id)
                .ok_or(StoreError::BadTransaction)?;
            if let Some((_, value)) = state.writes.iter().rev().find(|(k, _)| *k == full) {
                return Ok(value.clone());
            }
        }
        inner
            .entries
            .get(&full)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(full))
    }

    fn write(
        &self,
        txn: Option<&Transaction>,
        path: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let full = full_key(path, key);
        match txn {
            Some(txn) => {
                let state = inner
                    .transactions
                    .get_mut(&txn.id)
                    .ok_or(StoreError::BadTransaction)?;
                state.writes.push((full, value.to_string()));
            }
            None => {
                inner.entries.insert(full.clone(), value.to_string());
                let generation = inner.generation + 1;
                inner.generation = generation;
                inner.modified.insert(full.clone(), generation);
                fire_watches(&inner, &full);
            }
        }
        Ok(())
    }

    fn watch(&self, path: &str, key: &str) -> Result<Watch, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        let event = Arc::new(WatchEvent {
            // Signalled at registration so the first wait re-reads the
            // current value instead of blocking on a change that may have
            // already happened.
            signalled: Mutex::new(true),
            condvar: Condvar::new(),
        });
        inner
            .watches
            .push((id, full_key(path, key), event.clone()));
        Ok(Watch { id, event })
    }

    fn unwatch(&self, watch: Watch) {
        let mut inner = self.inner.lock().unwrap();
        inner.watches.retain(|(id, _, _)| *id != watch.id);
    }

    fn transaction_start(&self) -> Result<Transaction, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        let start_generation = inner.generation;
        inner.transactions.insert(
            id,
            TxnState {
                start_generation,
                writes: Vec::new(),
            },
        );
        Ok(Transaction { id })
    }

    fn transaction_end(&self, txn: Transaction, commit: bool) -> Result<Commit, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let state = inner
            .transactions
            .remove(&txn.id)
            .ok_or(StoreError::BadTransaction)?;

        if !commit {
            return Ok(Commit::Aborted);
        }
        if inner.forced_retries > 0 {
            inner.forced_retries -= 1;
            return Ok(Commit::Retry);
        }
        let conflict = state.writes.iter().any(|(full, _)| {
            inner
                .modified
                .get(full)
                .is_some_and(|&generation| generation > state.start_generation)
        });
        if conflict {
            return Ok(Commit::Retry);
        }

        let generation = inner.generation + 1;
        inner.generation = generation;
        for (full, value) in state.writes {
            inner.entries.insert(full.clone(), value);
            inner.modified.insert(full.clone(), generation);
            fire_watches(&inner, &full);
        }
        Ok(Commit::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_writes_are_invisible_until_commit() {
        let store = MemoryStore::new();
        let txn = store.transaction_start().unwrap();
        store
            .write(Some(&txn), "device/0", "evtchn", "5")
            .unwrap();
        assert!(store.get("device/0", "evtchn").is_none());
        // The transaction itself sees its own writes.
        assert_eq!(
            store.read(Some(&txn), "device/0", "evtchn").unwrap(),
            "5"
        );
        assert_eq!(store.transaction_end(txn, true).unwrap(), Commit::Committed);
        assert_eq!(store.get("device/0", "evtchn").unwrap(), "5");
    }

    #[test]
    fn conflicting_commit_retries() {
        let store = MemoryStore::new();
        store.write(None, "device/0", "state", "1").unwrap();

        let txn = store.transaction_start().unwrap();
        store.write(Some(&txn), "device/0", "state", "2").unwrap();
        // A bare write to the same key lands first.
        store.write(None, "device/0", "state", "6").unwrap();
        assert_eq!(store.transaction_end(txn, true).unwrap(), Commit::Retry);
        assert_eq!(store.get("device/0", "state").unwrap(), "6");
    }

    #[test]
    fn abort_discards_writes() {
        let store = MemoryStore::new();
        let txn = store.transaction_start().unwrap();
        store.write(Some(&txn), "device/0", "gnttab", "9").unwrap();
        assert_eq!(store.transaction_end(txn, false).unwrap(), Commit::Aborted);
        assert!(store.get("device/0", "gnttab").is_none());
    }

    #[test]
    fn watch_fires_on_registration_and_write() {
        let store = MemoryStore::new();
        let watch = store.watch("backend/0", "state").unwrap();
        assert!(watch.wait_timeout(Duration::from_millis(1)));
        watch.clear();
        assert!(!watch.wait_timeout(Duration::from_millis(1)));

        store.write(None, "backend/0", "state", "4").unwrap();
        assert!(watch.wait_timeout(Duration::from_millis(100)));
        store.unwatch(watch);
    }
}
