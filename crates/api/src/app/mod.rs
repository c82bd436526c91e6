//! HTTP application wiring.
//!
//! - `errors.rs`: consistent error responses
//! - `diagnostics.rs`: health and "what may I do" endpoints

use axum::{Router, routing::get};

use civgate_auth::Authorizer;

use crate::middleware::access_gate_middleware;

pub mod diagnostics;
pub mod errors;

/// Put `routes` behind the access gate and add the diagnostic endpoints.
pub fn build_app(authorizer: Authorizer, routes: Router<Authorizer>) -> Router {
    routes
        .route("/health", get(diagnostics::health))
        .route("/authz/me", get(diagnostics::me))
        .route("/authz/me/modules/:module", get(diagnostics::module_status))
        .layer(axum::middleware::from_fn_with_state(
            authorizer.clone(),
            access_gate_middleware,
        ))
        .with_state(authorizer)
}
