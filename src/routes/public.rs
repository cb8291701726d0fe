use crate::{AppState, handlers, routes::RouteTable};
use axum::http::Method;

/// Public Router Module
///
/// Endpoints any client may call, with or without a token. Each is recorded as
/// public for its own verb only.
pub fn public_routes() -> RouteTable<AppState> {
    RouteTable::new()
        // GET /health
        // Liveness probe for monitoring and load balancer checks.
        .public(Method::GET, "/health", handlers::health)
        // GET /version
        // Package version and runtime environment.
        .public(Method::GET, "/version", handlers::version)
}
