//! HTTP layer: per-request access gate, route table and request context.

pub mod app;
pub mod context;
pub mod middleware;
pub mod routes;

pub use app::build_app;
pub use context::AuthzContext;
pub use middleware::access_gate_middleware;
pub use routes::RouteTable;
