// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Rewards - Wallet Login & Reward Claims Service
//!
//! Users log in by signing a one-time challenge with their wallet, receive a
//! bearer session token, and claim rewards that accrue per hour since their
//! last claim. Claims are two-phase: a pending claim reserves the amount and
//! is confirmed once the settlement transfer is reported.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Wallet challenges, signature checks and sessions
//! - `ratelimit` - Token-bucket admission control
//! - `rewards` - Accrual, accounts and the claim state machine
//! - `storage` - Versioned key-value store (memory or redb)
//! - `sweeper` - Periodic expiry of stale claims and records

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod rewards;
pub mod state;
pub mod storage;
pub mod sweeper;
