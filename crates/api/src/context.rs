use std::ops::Deref;
use std::sync::Arc;

use civgate_auth::RequestContext;

/// Authorization context for the current request.
///
/// Inserted by [`access_gate_middleware`](crate::middleware::access_gate_middleware)
/// once the request is allowed; handlers reuse it so the profile and module
/// catalog loaded by the gate are not queried again. Dropped with the request.
#[derive(Debug, Clone)]
pub struct AuthzContext(Arc<RequestContext>);

impl AuthzContext {
    pub fn new(ctx: Arc<RequestContext>) -> Self {
        Self(ctx)
    }
}

impl Deref for AuthzContext {
    type Target = RequestContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
