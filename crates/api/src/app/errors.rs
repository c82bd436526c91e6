use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use civgate_auth::DirectoryError;

/// Storage failures are never turned into an allow or a deny.
pub fn directory_error_to_response(_err: DirectoryError) -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "authorization_unavailable",
        "authorization data is temporarily unavailable",
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
