// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process store used for single-instance deployments and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::kv::{CommitOutcome, KvStore, StoreError, StoreResult, Table, Versioned, WriteOp};

/// In-memory [`KvStore`].
///
/// A commit holds the map lock for validation and application, so batches
/// are serializable with respect to each other.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, BTreeMap<String, Versioned>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, table: Table, key: &str) -> StoreResult<Option<Versioned>> {
        let tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(tables.get(&table).and_then(|t| t.get(key)).cloned())
    }

    fn scan(&self, table: Table) -> StoreResult<Vec<(String, Versioned)>> {
        let tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(tables
            .get(&table)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn commit(&self, ops: Vec<WriteOp>) -> StoreResult<CommitOutcome> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;

        let all_hold = ops.iter().all(|op| {
            let (table, key, expect) = op.target();
            let current = tables.get(&table).and_then(|t| t.get(key)).map(|v| v.version);
            expect.matches(current)
        });
        if !all_hold {
            return Ok(CommitOutcome::Conflict);
        }

        for op in ops {
            match op {
                WriteOp::Put {
                    table, key, value, ..
                } => {
                    let entries = tables.entry(table).or_default();
                    let version = entries.get(&key).map(|v| v.version + 1).unwrap_or(1);
                    entries.insert(key, Versioned { version, value });
                }
                WriteOp::Delete { table, key, .. } => {
                    if let Some(entries) = tables.get_mut(&table) {
                        entries.remove(&key);
                    }
                }
                WriteOp::Check { .. } => {}
            }
        }

        Ok(CommitOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Expect;

    #[test]
    fn put_assigns_increasing_versions() {
        let store = MemoryStore::new();
        assert!(store
            .update_if(Table::Users, "a", None, b"1".to_vec())
            .unwrap()
            .is_applied());
        assert_eq!(store.get(Table::Users, "a").unwrap().unwrap().version, 1);

        assert!(store
            .update_if(Table::Users, "a", Some(1), b"2".to_vec())
            .unwrap()
            .is_applied());
        let current = store.get(Table::Users, "a").unwrap().unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.value, b"2".to_vec());
    }

    #[test]
    fn stale_version_is_rejected() {
        let store = MemoryStore::new();
        store.update_if(Table::Users, "a", None, b"1".to_vec()).unwrap();
        store.update_if(Table::Users, "a", Some(1), b"2".to_vec()).unwrap();

        let outcome = store
            .update_if(Table::Users, "a", Some(1), b"3".to_vec())
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);
        assert_eq!(store.get(Table::Users, "a").unwrap().unwrap().value, b"2".to_vec());
    }

    #[test]
    fn failed_batch_writes_nothing() {
        let store = MemoryStore::new();
        store.update_if(Table::Claims, "existing", None, b"x".to_vec()).unwrap();

        let outcome = store
            .commit(vec![
                WriteOp::put(Table::Claims, "new", Expect::Absent, b"y".to_vec()),
                WriteOp::put(Table::Claims, "existing", Expect::Absent, b"z".to_vec()),
            ])
            .unwrap();

        assert_eq!(outcome, CommitOutcome::Conflict);
        assert!(store.get(Table::Claims, "new").unwrap().is_none());
        assert_eq!(store.get(Table::Claims, "existing").unwrap().unwrap().value, b"x".to_vec());
    }

    #[test]
    fn delete_and_check_ops() {
        let store = MemoryStore::new();
        store.update_if(Table::PendingClaims, "u1", None, b"tx".to_vec()).unwrap();

        let outcome = store
            .commit(vec![
                WriteOp::check(Table::Accounts, "u1", Expect::Absent),
                WriteOp::delete(Table::PendingClaims, "u1", Expect::Version(1)),
            ])
            .unwrap();
        assert!(outcome.is_applied());
        assert!(store.get(Table::PendingClaims, "u1").unwrap().is_none());
    }

    #[test]
    fn scan_is_scoped_to_table() {
        let store = MemoryStore::new();
        store.update_if(Table::Sessions, "s1", None, b"1".to_vec()).unwrap();
        store.update_if(Table::Sessions, "s2", None, b"2".to_vec()).unwrap();
        store.update_if(Table::Users, "u1", None, b"3".to_vec()).unwrap();

        let sessions = store.scan(Table::Sessions).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].0, "s1");
    }
}
