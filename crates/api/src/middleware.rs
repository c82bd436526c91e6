use std::sync::Arc;

use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use civgate_auth::{Account, Authorizer, Decision, RequestContext};

use crate::app::errors::{directory_error_to_response, json_error};
use crate::context::AuthzContext;

/// Runs the access gate before any handler.
///
/// The authenticated [`Account`] is read from the request extensions, where
/// the authentication layer in front of this one puts it; its absence means
/// an anonymous caller.
pub async fn access_gate_middleware(
    State(authorizer): State<Authorizer>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let ctx = Arc::new(match req.extensions().get::<Account>() {
        Some(account) => RequestContext::for_account(account.clone()),
        None => RequestContext::anonymous(),
    });

    let path = req.uri().path().to_owned();
    match authorizer.check_request(&path, &ctx).await {
        Ok(Decision::Allow(_)) => {
            req.extensions_mut().insert(AuthzContext::new(ctx));
            next.run(req).await
        }
        Ok(Decision::Reject(rejection)) => json_error(
            StatusCode::from_u16(rejection.status()).unwrap_or(StatusCode::FORBIDDEN),
            "forbidden",
            rejection.message(),
        ),
        Err(err) => {
            tracing::error!(path = %path, error = %err, "access gate lookup failed");
            directory_error_to_response(err)
        }
    }
}
