// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The versioned key/value contract shared by all storage backends.

use std::fmt;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt record {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    Poisoned,

    /// A conditional update kept losing against concurrent writers.
    #[error("contention on {0}")]
    Contention(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Tables
// =============================================================================

/// Logical record families. Keys are namespaced by table in every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Challenges,
    Buckets,
    Sessions,
    Users,
    Accounts,
    Claims,
    PendingClaims,
    Pool,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Challenges => "challenges",
            Table::Buckets => "buckets",
            Table::Sessions => "sessions",
            Table::Users => "users",
            Table::Accounts => "accounts",
            Table::Claims => "claims",
            Table::PendingClaims => "pending_claims",
            Table::Pool => "pool",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Values & Operations
// =============================================================================

/// A stored value together with its version (first write is version 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub version: u64,
    pub value: Vec<u8>,
}

/// Precondition on the current version of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Unconditional.
    Any,
    /// Key must not exist.
    Absent,
    /// Key must exist at exactly this version.
    Version(u64),
}

impl Expect {
    /// Expectation matching a previous read (`None` meaning "was absent").
    pub fn from_read(version: Option<u64>) -> Self {
        match version {
            Some(v) => Expect::Version(v),
            None => Expect::Absent,
        }
    }

    pub fn matches(&self, current: Option<u64>) -> bool {
        match (self, current) {
            (Expect::Any, _) => true,
            (Expect::Absent, None) => true,
            (Expect::Absent, Some(_)) => false,
            (Expect::Version(want), Some(have)) => *want == have,
            (Expect::Version(_), None) => false,
        }
    }
}

/// A single write inside an atomic commit.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put {
        table: Table,
        key: String,
        expect: Expect,
        value: Vec<u8>,
    },
    Delete {
        table: Table,
        key: String,
        expect: Expect,
    },
    /// Guard only: fails the commit unless the expectation holds.
    Check {
        table: Table,
        key: String,
        expect: Expect,
    },
}

impl WriteOp {
    pub fn put(table: Table, key: impl Into<String>, expect: Expect, value: Vec<u8>) -> Self {
        WriteOp::Put {
            table,
            key: key.into(),
            expect,
            value,
        }
    }

    pub fn delete(table: Table, key: impl Into<String>, expect: Expect) -> Self {
        WriteOp::Delete {
            table,
            key: key.into(),
            expect,
        }
    }

    pub fn check(table: Table, key: impl Into<String>, expect: Expect) -> Self {
        WriteOp::Check {
            table,
            key: key.into(),
            expect,
        }
    }

    pub fn target(&self) -> (Table, &str, Expect) {
        match self {
            WriteOp::Put {
                table, key, expect, ..
            }
            | WriteOp::Delete { table, key, expect }
            | WriteOp::Check { table, key, expect } => (*table, key.as_str(), *expect),
        }
    }
}

/// Result of a conditional commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// At least one expectation failed; nothing was written.
    Conflict,
}

impl CommitOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommitOutcome::Applied)
    }
}

// =============================================================================
// Store Contract
// =============================================================================

/// Versioned key/value store with all-or-nothing conditional commits.
pub trait KvStore: Send + Sync {
    /// Read the current value and version of a key.
    fn get(&self, table: Table, key: &str) -> StoreResult<Option<Versioned>>;

    /// List every key in a table.
    fn scan(&self, table: Table) -> StoreResult<Vec<(String, Versioned)>>;

    /// Validate every expectation and apply every write atomically.
    fn commit(&self, ops: Vec<WriteOp>) -> StoreResult<CommitOutcome>;

    /// Single-key conditional update.
    ///
    /// `expected_version = None` means the key must not exist yet.
    fn update_if(
        &self,
        table: Table,
        key: &str,
        expected_version: Option<u64>,
        value: Vec<u8>,
    ) -> StoreResult<CommitOutcome> {
        self.commit(vec![WriteOp::put(
            table,
            key,
            Expect::from_read(expected_version),
            value,
        )])
    }

    /// Backend health probe.
    fn health_check(&self) -> StoreResult<()> {
        self.get(Table::Pool, "stats").map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expect_matches_versions() {
        assert!(Expect::Any.matches(None));
        assert!(Expect::Any.matches(Some(3)));
        assert!(Expect::Absent.matches(None));
        assert!(!Expect::Absent.matches(Some(1)));
        assert!(Expect::Version(2).matches(Some(2)));
        assert!(!Expect::Version(2).matches(Some(3)));
        assert!(!Expect::Version(2).matches(None));
    }

    #[test]
    fn from_read_maps_absent_and_present() {
        assert_eq!(Expect::from_read(None), Expect::Absent);
        assert_eq!(Expect::from_read(Some(7)), Expect::Version(7));
    }
}
