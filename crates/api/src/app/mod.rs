//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: ledger store and auth service selection
//! - `routes/`: HTTP routes + handlers (one file per audience)
//! - `dto.rs`: request parsing and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::authz::CLIENT_ROUTE_ROLES;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{build_services, AppServices};

/// Build the full HTTP router. `internal_api_key` guards `/api/internal`.
pub fn build_app(services: AppServices, internal_api_key: &str) -> Router {
    let api_key_state = middleware::ApiKeyState {
        api_key: Arc::from(internal_api_key),
    };
    let auth_state = middleware::AuthState {
        auth: services.auth.clone(),
        allowed: Arc::from(CLIENT_ROUTE_ROLES),
    };
    let services = Arc::new(services);

    // Called by other backends: shared secret only.
    let internal = routes::internal::router().layer(axum::middleware::from_fn_with_state(
        api_key_state,
        middleware::api_key_middleware,
    ));

    // Called by clients: bearer token + client role.
    let engagement = routes::engagement::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/internal", internal)
        .nest("/api/engagement", engagement)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(Extension(services)),
        )
}
