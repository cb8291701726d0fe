use crate::{AppState, handlers, routes::RouteTable};
use axum::http::Method;

/// Authenticated Router Module
///
/// Endpoints behind the auth gate. Handlers take the `AuthUser` extractor, which
/// rejects requests the gate forwarded without a principal.
pub fn authenticated_routes() -> RouteTable<AppState> {
    RouteTable::new()
        // GET /me
        // The identity resolved from the caller's bearer token.
        .secured(Method::GET, "/me", handlers::get_me)
}
