use axum::{Json, extract::State};

use crate::{
    auth::{AuthUser, Principal},
    config::AppConfig,
    models::{ErrorBody, HealthResponse, VersionResponse},
};

// --- Handlers ---

/// health
///
/// [Public Route] Returns `{"status": "ok"}` as soon as the service accepts requests.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// version
///
/// [Public Route] Reports the package name, version and runtime environment.
#[utoipa::path(
    get,
    path = "/version",
    responses((status = 200, description = "Service version", body = VersionResponse))
)]
pub async fn version(State(config): State<AppConfig>) -> Json<VersionResponse> {
    Json(VersionResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: config.env.as_str().to_string(),
    })
}

/// get_me
///
/// [Authenticated Route] Returns the principal the auth gate resolved for this request.
/// Without one, the `AuthUser` extractor answers 401 before this runs.
#[utoipa::path(
    get,
    path = "/me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Authenticated principal", body = Principal),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 503, description = "Signing keys could not be fetched", body = ErrorBody)
    )
)]
pub async fn get_me(AuthUser(principal): AuthUser) -> Json<Principal> {
    Json(principal)
}
