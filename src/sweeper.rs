// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Background Sweeper
//!
//! Periodic housekeeping so that state transitions happen server-side even
//! when no client touches the affected records.
//!
//! ## Strategy
//!
//! Every `interval` (default 60 s) the sweeper:
//! 1. Fails pending claims past their confirmation TTL.
//! 2. Drops expired login challenges.
//! 3. Drops expired sessions.
//! 4. Drops rate-limit buckets that have fully refilled.
//!
//! Each step is independent; a failing step is logged and the rest still run.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// What one sweep removed or expired.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_claims: usize,
    pub purged_challenges: usize,
    pub purged_sessions: usize,
    pub purged_buckets: usize,
}

pub struct Sweeper {
    state: AppState,
    interval: Duration,
}

impl Sweeper {
    pub fn new(state: AppState, interval: Duration) -> Self {
        Self { state, interval }
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Sweeper starting");

        loop {
            if shutdown.is_cancelled() {
                info!("Sweeper shutting down");
                return;
            }

            let report = self.sweep();
            if report != SweepReport::default() {
                info!(
                    expired_claims = report.expired_claims,
                    purged_challenges = report.purged_challenges,
                    purged_sessions = report.purged_sessions,
                    purged_buckets = report.purged_buckets,
                    "Sweep completed"
                );
            } else {
                debug!("Sweep found nothing to do");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// One pass over every housekeeping step.
    pub fn sweep(&self) -> SweepReport {
        let now = Utc::now();
        let mut report = SweepReport::default();

        match self.state.claims.expire_stale_at(now) {
            Ok(n) => report.expired_claims = n,
            Err(e) => warn!(error = %e, "Sweeper: failed to expire stale claims"),
        }
        match self.state.challenges.purge_expired(now) {
            Ok(n) => report.purged_challenges = n,
            Err(e) => warn!(error = %e, "Sweeper: failed to purge challenges"),
        }
        match self.state.sessions.purge_expired(now) {
            Ok(n) => report.purged_sessions = n,
            Err(e) => warn!(error = %e, "Sweeper: failed to purge sessions"),
        }
        match self.state.rate_limiter.purge_idle(now) {
            Ok(n) => report.purged_buckets = n,
            Err(e) => warn!(error = %e, "Sweeper: failed to purge rate-limit buckets"),
        }

        report
    }
}
