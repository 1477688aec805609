// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{AuthenticatedUser, IssuedChallenge},
    error::stamp_request_id,
    ratelimit::general_rate_limit,
    rewards::{ClaimStatus, ClaimTransaction, PoolState, PoolUpdate, RewardAccount, User},
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod rewards;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/challenge", post(auth::challenge))
        .route("/auth/wallet-connect", post(auth::wallet_connect))
        .route("/auth/logout", post(auth::logout))
        .route(
            "/auth/sessions/revoke-others",
            post(auth::revoke_other_sessions),
        )
        .route("/rewards/available", get(rewards::available))
        .route("/rewards/claim", post(rewards::claim))
        .route("/rewards/confirm", post(rewards::confirm))
        .route("/rewards/claims/{transaction_id}", get(rewards::get_claim))
        .route("/rewards/pool", get(rewards::pool))
        .route(
            "/admin/pool",
            get(admin::get_pool).patch(admin::update_pool),
        )
        .route("/admin/accounts/{user_id}", get(admin::get_account))
        .route(
            "/admin/accounts/{user_id}/active",
            put(admin::set_account_active),
        )
        .route(
            "/admin/claims/{transaction_id}/fail",
            post(admin::fail_claim),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            general_rate_limit,
        ));

    let cors = cors_layer(state.config.cors_origins.as_deref());

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                // Cors needs a `Default` response body, so it sits inside Trace.
                .layer(cors)
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::from_fn(stamp_request_id)),
        )
}

/// Restrict CORS to the configured origins, or allow any origin when unset.
fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([
            header::HeaderName::from_static("x-request-id"),
            header::HeaderName::from_static("x-ratelimit-limit"),
            header::HeaderName::from_static("x-ratelimit-remaining"),
            header::HeaderName::from_static("x-ratelimit-reset"),
            header::RETRY_AFTER,
        ])
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::challenge,
        auth::wallet_connect,
        auth::logout,
        auth::revoke_other_sessions,
        rewards::available,
        rewards::claim,
        rewards::confirm,
        rewards::get_claim,
        rewards::pool,
        admin::get_pool,
        admin::update_pool,
        admin::get_account,
        admin::set_account_active,
        admin::fail_claim,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            IssuedChallenge,
            AuthenticatedUser,
            User,
            RewardAccount,
            PoolState,
            PoolUpdate,
            ClaimStatus,
            ClaimTransaction,
            auth::ChallengeRequest,
            auth::WalletConnectRequest,
            auth::WalletConnectResponse,
            auth::LogoutResponse,
            auth::RevokeOthersResponse,
            rewards::AvailableRewardsResponse,
            rewards::ClaimRequest,
            rewards::ClaimResponse,
            rewards::ConfirmRequest,
            rewards::ConfirmResponse,
            rewards::PoolResponse,
            admin::AccountActivationRequest,
            admin::FailClaimRequest,
            health::ReadinessReport,
            health::StoreProbe,
            health::LivenessReport
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Wallet challenge login and sessions"),
        (name = "Rewards", description = "Reward accrual and claims"),
        (name = "Admin", description = "Pool and account management"),
        (name = "Health", description = "Service probes")
    )
)]
struct ApiDoc;
