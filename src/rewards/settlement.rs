// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Settlement signature checks.
//!
//! The transfer itself happens on an external ledger. The service only
//! decides whether a reported settlement signature is acceptable for a claim.

use super::claims::ClaimTransaction;

pub trait SettlementVerifier: Send + Sync {
    fn verify(&self, claim: &ClaimTransaction, signature: &str) -> bool;
}

/// Accepts well-formed ledger transaction ids: a base58 64-byte signature
/// (Solana) or a `0x` 32-byte hash (EVM).
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionIdFormat;

impl SettlementVerifier for TransactionIdFormat {
    fn verify(&self, _claim: &ClaimTransaction, signature: &str) -> bool {
        let signature = signature.trim();
        if let Some(hash) = signature.strip_prefix("0x") {
            return hex::decode(hash).is_ok_and(|b| b.len() == 32);
        }
        bs58::decode(signature)
            .into_vec()
            .is_ok_and(|b| b.len() == 64)
    }
}
