use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use civgate_auth::Authorizer;

use super::errors::{directory_error_to_response, json_error};
use crate::context::AuthzContext;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// The caller's effective permissions, sorted.
pub async fn me(
    State(authorizer): State<Authorizer>,
    Extension(ctx): Extension<AuthzContext>,
) -> Response {
    let Some(account) = ctx.account() else {
        return json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "authentication required");
    };

    let is_admin = match authorizer.is_admin(&ctx).await {
        Ok(is_admin) => is_admin,
        Err(err) => return directory_error_to_response(err),
    };
    let permissions = match authorizer.effective_permissions(&ctx).await {
        Ok(permissions) => permissions,
        Err(err) => return directory_error_to_response(err),
    };

    Json(json!({
        "account_id": account.id,
        "is_admin": is_admin,
        "permissions": permissions.to_sorted_strings(),
    }))
    .into_response()
}

/// Whether a module's entry points are reachable for the caller.
pub async fn module_status(
    State(authorizer): State<Authorizer>,
    Extension(ctx): Extension<AuthzContext>,
    Path(module): Path<String>,
) -> Response {
    match authorizer.module_enabled(&ctx, &module).await {
        Ok(enabled) => Json(json!({ "module": module, "enabled": enabled })).into_response(),
        Err(err) => directory_error_to_response(err),
    }
}
