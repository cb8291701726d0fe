//! Router Module Index
//!
//! Every route is declared through a `RouteTable`, which records the verb, the path
//! and the public flag next to the handler. The endpoint classifier is built from
//! those records, so a route's access level lives in exactly one place.

use axum::{
    Router,
    handler::Handler,
    http::Method,
    routing::{MethodFilter, MethodRouter, on},
};

use crate::{AppState, classifier::RouteRegistration};

/// Routes reachable without credentials.
pub mod public;

/// Routes that need an authenticated principal.
pub mod authenticated;

/// RouteTable
///
/// Declarative route table: axum method routers paired with their registrations.
pub struct RouteTable<S = AppState> {
    routes: Vec<(RouteRegistration, MethodRouter<S>)>,
}

impl<S> Default for RouteTable<S> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<S> RouteTable<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route callable without credentials.
    pub fn public<H, T>(self, method: Method, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.register(method, path, true, handler)
    }

    /// Registers a route that requires an authenticated principal.
    pub fn secured<H, T>(self, method: Method, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.register(method, path, false, handler)
    }

    /// # Panics
    /// Panics for verbs axum cannot route (e.g. CONNECT extensions), like axum itself does
    /// for invalid route paths.
    fn register<H, T>(mut self, method: Method, path: &str, public: bool, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        let filter = MethodFilter::try_from(method.clone())
            .unwrap_or_else(|_| panic!("cannot route {method} {path}: unsupported HTTP method"));

        self.routes.push((
            RouteRegistration::new(method, path, public),
            on(filter, handler),
        ));
        self
    }

    pub fn merge(mut self, other: RouteTable<S>) -> Self {
        self.routes.extend(other.routes);
        self
    }

    pub fn registrations(&self) -> impl Iterator<Item = &RouteRegistration> {
        self.routes.iter().map(|(registration, _)| registration)
    }

    /// Builds the axum router. Routes sharing a path are merged into one method router.
    pub fn into_router(self) -> Router<S> {
        self.routes
            .into_iter()
            .fold(Router::new(), |router, (registration, method_router)| {
                router.route(&registration.path, method_router)
            })
    }
}

/// The complete API surface of the service.
pub fn api_routes() -> RouteTable<AppState> {
    public::public_routes().merge(authenticated::authenticated_routes())
}
