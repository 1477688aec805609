// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded record store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `records`: `"{table}/{key}"` → `version_be_u64 ++ json_payload`
//!
//! A single redb table keeps every logical table so that one write
//! transaction can span claims, slots and accounts. redb serializes write
//! transactions, which gives [`KvStore::commit`] its all-or-nothing
//! semantics. The database file is locked by the opening process.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::kv::{
    CommitOutcome, KvStore, StoreError, StoreResult, Table, Versioned, WriteOp,
};

/// Primary table: namespaced key → version header + payload.
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

const VERSION_LEN: usize = 8;

// =============================================================================
// Key & Value Helpers
// =============================================================================

fn make_key(table: Table, key: &str) -> String {
    format!("{}/{}", table.name(), key)
}

fn make_prefix(table: Table) -> String {
    format!("{}/", table.name())
}

fn encode_value(version: u64, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(VERSION_LEN + payload.len());
    bytes.extend_from_slice(&version.to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

fn decode_value(full_key: &str, bytes: &[u8]) -> StoreResult<Versioned> {
    if bytes.len() < VERSION_LEN {
        return Err(StoreError::Corrupt(full_key.to_string()));
    }
    let (header, payload) = bytes.split_at(VERSION_LEN);
    let mut version = [0u8; VERSION_LEN];
    version.copy_from_slice(header);
    Ok(Versioned {
        version: u64::from_be_bytes(version),
        value: payload.to_vec(),
    })
}

// =============================================================================
// RedbStore
// =============================================================================

/// Embedded ACID record store.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, table: Table, key: &str) -> StoreResult<Option<Versioned>> {
        let full_key = make_key(table, key);
        let read_txn = self.db.begin_read()?;
        let records = read_txn.open_table(RECORDS)?;
        match records.get(full_key.as_str())? {
            Some(value) => Ok(Some(decode_value(&full_key, value.value())?)),
            None => Ok(None),
        }
    }

    fn scan(&self, table: Table) -> StoreResult<Vec<(String, Versioned)>> {
        let prefix = make_prefix(table);
        let read_txn = self.db.begin_read()?;
        let records = read_txn.open_table(RECORDS)?;

        let mut results = Vec::new();
        for entry in records.range(prefix.as_str()..)? {
            let (key, value) = entry?;
            let full_key = key.value();
            let Some(short_key) = full_key.strip_prefix(prefix.as_str()) else {
                break;
            };
            results.push((short_key.to_string(), decode_value(full_key, value.value())?));
        }
        Ok(results)
    }

    fn commit(&self, ops: Vec<WriteOp>) -> StoreResult<CommitOutcome> {
        let write_txn = self.db.begin_write()?;
        {
            let mut records = write_txn.open_table(RECORDS)?;

            // Validate every expectation against the pre-commit state
            for op in &ops {
                let (table, key, expect) = op.target();
                let full_key = make_key(table, key);
                let current = match records.get(full_key.as_str())? {
                    Some(value) => Some(decode_value(&full_key, value.value())?.version),
                    None => None,
                };
                if !expect.matches(current) {
                    drop(records);
                    write_txn.abort()?;
                    return Ok(CommitOutcome::Conflict);
                }
            }

            for op in &ops {
                match op {
                    WriteOp::Put {
                        table, key, value, ..
                    } => {
                        let full_key = make_key(*table, key);
                        let next_version = match records.get(full_key.as_str())? {
                            Some(existing) => decode_value(&full_key, existing.value())?.version + 1,
                            None => 1,
                        };
                        let bytes = encode_value(next_version, value);
                        records.insert(full_key.as_str(), bytes.as_slice())?;
                    }
                    WriteOp::Delete { table, key, .. } => {
                        let full_key = make_key(*table, key);
                        records.remove(full_key.as_str())?;
                    }
                    WriteOp::Check { .. } => {}
                }
            }
        }
        write_txn.commit()?;
        Ok(CommitOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Expect;
    use tempfile::TempDir;

    fn open_temp() -> (RedbStore, TempDir) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = RedbStore::open(&dir.path().join("rewards.redb")).expect("open");
        (store, dir)
    }

    #[test]
    fn conditional_put_roundtrip() {
        let (store, _dir) = open_temp();
        assert!(store
            .update_if(Table::Accounts, "user-1", None, b"{}".to_vec())
            .unwrap()
            .is_applied());

        let current = store.get(Table::Accounts, "user-1").unwrap().unwrap();
        assert_eq!(current.version, 1);
        assert_eq!(current.value, b"{}".to_vec());

        // Second insert-if-absent loses
        let outcome = store
            .update_if(Table::Accounts, "user-1", None, b"[]".to_vec())
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);
    }

    #[test]
    fn multi_key_commit_is_all_or_nothing() {
        let (store, _dir) = open_temp();
        store.update_if(Table::PendingClaims, "user-1", None, b"tx-1".to_vec()).unwrap();

        let outcome = store
            .commit(vec![
                WriteOp::put(Table::Claims, "tx-2", Expect::Absent, b"claim".to_vec()),
                WriteOp::put(Table::PendingClaims, "user-1", Expect::Absent, b"tx-2".to_vec()),
            ])
            .unwrap();

        assert_eq!(outcome, CommitOutcome::Conflict);
        assert!(store.get(Table::Claims, "tx-2").unwrap().is_none());
    }

    #[test]
    fn scan_returns_only_table_keys() {
        let (store, _dir) = open_temp();
        store.update_if(Table::Claims, "a", None, b"1".to_vec()).unwrap();
        store.update_if(Table::Claims, "b", None, b"2".to_vec()).unwrap();
        store.update_if(Table::Challenges, "w", None, b"3".to_vec()).unwrap();

        let claims = store.scan(Table::Claims).unwrap();
        let keys: Vec<_> = claims.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn delete_removes_key() {
        let (store, _dir) = open_temp();
        store.update_if(Table::Sessions, "s", None, b"1".to_vec()).unwrap();
        let outcome = store
            .commit(vec![WriteOp::delete(Table::Sessions, "s", Expect::Version(1))])
            .unwrap();
        assert!(outcome.is_applied());
        assert!(store.get(Table::Sessions, "s").unwrap().is_none());
    }

    #[test]
    fn file_is_held_by_one_store_at_a_time() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("rewards.redb");

        let store = RedbStore::open(&path).expect("open");
        store
            .update_if(Table::Accounts, "user-1", None, b"{}".to_vec())
            .unwrap();
        assert!(RedbStore::open(&path).is_err());

        drop(store);
        let reopened = RedbStore::open(&path).expect("reopen after close");
        assert!(reopened.get(Table::Accounts, "user-1").unwrap().is_some());
    }
}
