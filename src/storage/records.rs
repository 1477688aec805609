// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed JSON records on top of the raw [`KvStore`].

use serde::{de::DeserializeOwned, Serialize};

use super::kv::{Expect, KvStore, StoreResult, Table};

/// A decoded record and the version it was read at.
#[derive(Debug, Clone)]
pub struct Record<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Record<T> {
    /// Expectation that the record is still at the version we read.
    pub fn expect(&self) -> Expect {
        Expect::Version(self.version)
    }
}

pub fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read and decode a single record.
pub fn get_record<T: DeserializeOwned>(
    store: &dyn KvStore,
    table: Table,
    key: &str,
) -> StoreResult<Option<Record<T>>> {
    match store.get(table, key)? {
        Some(raw) => Ok(Some(Record {
            value: decode(&raw.value)?,
            version: raw.version,
        })),
        None => Ok(None),
    }
}

/// Read and decode every record in a table.
///
/// Undecodable entries are skipped with a warning rather than failing the scan.
pub fn scan_records<T: DeserializeOwned>(
    store: &dyn KvStore,
    table: Table,
) -> StoreResult<Vec<(String, Record<T>)>> {
    let mut records = Vec::new();
    for (key, raw) in store.scan(table)? {
        match decode::<T>(&raw.value) {
            Ok(value) => records.push((
                key,
                Record {
                    value,
                    version: raw.version,
                },
            )),
            Err(e) => tracing::warn!(%table, key = %key, error = %e, "Skipping undecodable record"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
    }

    #[test]
    fn get_record_decodes_with_version() {
        let store = MemoryStore::new();
        let bytes = encode(&Sample { name: "a".into() }).unwrap();
        store.update_if(Table::Users, "k", None, bytes).unwrap();

        let record: Record<Sample> = get_record(&store, Table::Users, "k").unwrap().unwrap();
        assert_eq!(record.value.name, "a");
        assert_eq!(record.expect(), Expect::Version(1));
    }

    #[test]
    fn scan_skips_garbage() {
        let store = MemoryStore::new();
        store
            .update_if(Table::Users, "good", None, encode(&Sample { name: "g".into() }).unwrap())
            .unwrap();
        store.update_if(Table::Users, "bad", None, b"not json".to_vec()).unwrap();

        let records: Vec<(String, Record<Sample>)> = scan_records(&store, Table::Users).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, "good");
    }
}
