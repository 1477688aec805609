// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Readiness and liveness probes. Neither is rate limited.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::StoreBackend;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessReport {
    /// `ok` when every dependency answered, `degraded` otherwise.
    pub status: String,
    pub store: StoreProbe,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoreProbe {
    /// `memory` or `redb`.
    pub backend: String,
    pub reachable: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LivenessReport {
    pub status: String,
}

/// Report whether the record store can serve requests.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Ready", body = ReadinessReport),
        (status = 503, description = "Store unreachable", body = ReadinessReport)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    let reachable = match state.store.health_check() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    };

    let backend = match state.config.store {
        StoreBackend::Memory => "memory",
        StoreBackend::Redb(_) => "redb",
    };
    let (status, label) = if reachable {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let report = ReadinessReport {
        status: label.to_string(),
        store: StoreProbe {
            backend: backend.to_string(),
            reachable,
        },
        checked_at: Utc::now(),
    };
    (status, Json(report))
}

/// Answers as long as the process is serving HTTP.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses((status = 200, description = "Alive", body = LivenessReport))
)]
pub async fn liveness() -> Json<LivenessReport> {
    Json(LivenessReport {
        status: "ok".to_string(),
    })
}
