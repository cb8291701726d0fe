use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Request authentication: principal, security context, gate middleware.
pub mod auth;
pub mod gate;
// Public endpoint registry and Ant-style path patterns.
pub mod classifier;
pub mod pattern;
// Identity-provider token verification.
pub mod verifier;

pub mod config;
pub mod handlers;
pub mod models;

// Route declarations, segregated by access level.
pub mod routes;

// --- Public Re-exports ---

pub use auth::{AuthUser, Principal, SecurityContext};
pub use classifier::{EndpointClassifier, RouteRegistration};
pub use config::AppConfig;
pub use gate::{AuthGate, GateError, GateOutcome};
use gate::auth_gate;
pub use verifier::{MockTokenVerifier, TokenVerifier, VerifierState, VerifyError};

/// ApiDoc
///
/// Auto-generated OpenAPI document, served at `/v3/api-docs` and rendered by
/// Swagger UI at `/swagger-ui` when OpenAPI is enabled.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::health, handlers::version, handlers::get_me),
    components(
        schemas(
            models::HealthResponse, models::VersionResponse, models::ErrorBody,
            models::ErrorDetail, auth::Principal, auth::AuthDetails,
        )
    ),
    modifiers(&BearerAuthAddon),
    tags(
        (name = "api-gate", description = "Bearer-token authentication gate")
    )
)]
struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by secured operations.
struct BearerAuthAddon;

impl Modify for BearerAuthAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// Shared, immutable application state: configuration and the auth gate
/// (which owns the endpoint classifier and the token verifier).
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub gate: Arc<AuthGate>,
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Arc<AuthGate> {
    fn from_ref(app_state: &AppState) -> Arc<AuthGate> {
        app_state.gate.clone()
    }
}

/// create_router
///
/// Composition root. Builds the route table, initializes the endpoint classifier from
/// it exactly once, wires the auth gate in front of every route and applies the
/// observability layers.
pub fn create_router(config: AppConfig, verifier: VerifierState) -> Router {
    // 1. Declarative route table (the single source of each route's access level).
    let routes = routes::api_routes();

    // 2. Public endpoint registry, built before any traffic is accepted.
    let classifier = Arc::new(EndpointClassifier::initialize(
        routes.registrations(),
        config.openapi_enabled,
    ));
    let gate = Arc::new(AuthGate::new(
        classifier,
        verifier,
        config.subject_claim.clone(),
    ));

    let state = AppState {
        config: config.clone(),
        gate: gate.clone(),
    };

    let x_request_id = HeaderName::from_static("x-request-id");

    // 3. Routes, documentation and the gate.
    let mut router = routes.into_router();
    if config.openapi_enabled {
        router = router
            .merge(SwaggerUi::new("/swagger-ui").url("/v3/api-docs", ApiDoc::openapi()));
    }

    let router = router
        .layer(middleware::from_fn_with_state(gate, auth_gate))
        .with_state(state);

    // 4. Observability and correlation layers (outermost).
    router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(
            CorsLayer::new()
                .allow_methods(Any)
                .allow_origin(Any)
                .allow_headers(Any),
        )
}

/// trace_span_logger
///
/// Opens the per-request span carrying method, URI and the `x-request-id`, so every
/// log line of one request (gate decisions included) is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
