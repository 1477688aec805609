// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Versioned Storage Module
//!
//! Every record the service owns (challenges, rate-limit buckets, sessions,
//! users, reward accounts, claims) lives behind the [`KvStore`] contract:
//! a key/value store where each key carries a monotonically increasing
//! version and writes can be made conditional on that version.
//!
//! ## Atomicity Model
//!
//! Services never hold a lock across a read and a write. They read a record
//! together with its version, decide, and then submit a [`WriteOp`] batch to
//! [`KvStore::commit`]. The backend validates every expectation and applies
//! every write as one unit, or applies nothing and reports
//! [`CommitOutcome::Conflict`]. This is what keeps the nonce single-use,
//! the bucket from over-admitting and the reward account credited once.
//!
//! ## Backends
//!
//! - [`MemoryStore`] - single-process default
//! - [`RedbStore`] - durable single-process backend. redb locks its file,
//!   so running several instances needs a networked [`KvStore`] instead
//!
//! ## Key Layout
//!
//! ```text
//! challenges/{wallet_address}
//! buckets/{policy}:{key}
//! sessions/{session_id}
//! users/{wallet_address}
//! accounts/{user_id}
//! claims/{transaction_id}
//! pending_claims/{user_id}   # at-most-one pending claim slot
//! pool/stats
//! ```

pub mod kv;
pub mod memory;
pub mod records;
pub mod redb_store;

pub use kv::{
    CommitOutcome, Expect, KvStore, StoreError, StoreResult, Table, Versioned, WriteOp,
};
pub use memory::MemoryStore;
pub use records::{decode, encode, get_record, scan_records, Record};
pub use redb_store::RedbStore;
