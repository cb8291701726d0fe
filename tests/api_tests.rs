use api_gate::{AppConfig, MockTokenVerifier, Principal, create_router, models::ErrorBody};
use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceExt;

// --- Helper Functions ---

const VALID_TOKEN: &str = "abc.def.ghi";
const NO_SUBJECT_TOKEN: &str = "valid.but.anonymous";

fn verifier() -> MockTokenVerifier {
    MockTokenVerifier::new()
        .with_token(VALID_TOKEN, json!({"user_id": "u123", "email": "u123@example.com"}))
        .with_token(NO_SUBJECT_TOKEN, json!({"email": "ghost@example.com"}))
}

fn app(openapi_enabled: bool) -> Router {
    let config = AppConfig {
        openapi_enabled,
        ..AppConfig::default()
    };
    create_router(config, Arc::new(verifier()))
}

fn request(method: Method, uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

async fn json_body<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- Public Endpoints ---

#[tokio::test]
async fn test_health_is_public() {
    let response = send(app(false), request(Method::GET, "/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = json_body(response).await;
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_public_endpoint_ignores_invalid_token() {
    // Public endpoints never reach the verifier, so a bad token is harmless.
    let response = send(
        app(false),
        request(Method::GET, "/health", Some("Bearer forged.token.value")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_public_flag_is_verb_specific() {
    // POST /health is not public: the bad token is verified and refused.
    let response = send(
        app(false),
        request(Method::POST, "/health", Some("Bearer forged.token.value")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Without a token it is forwarded and the router answers for the missing verb.
    let response = send(app(false), request(Method::POST, "/health", None)).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_version_reports_environment() {
    let response = send(app(false), request(Method::GET, "/version", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = json_body(response).await;
    assert_eq!(body["name"], "api-gate");
    assert_eq!(body["environment"], "local");
}

// --- Secured Endpoints ---

#[tokio::test]
async fn test_valid_token_installs_principal() {
    let response = send(
        app(false),
        request(Method::GET, "/me", Some("Bearer abc.def.ghi")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let principal: Principal = json_body(response).await;
    assert_eq!(principal.subject, "u123");
    assert!(principal.authorities.is_empty());
    assert_eq!(principal.details.remote_addr, None);
    assert_eq!(principal.details.session_id, None);
}

#[tokio::test]
async fn test_principal_carries_request_details() {
    let peer: SocketAddr = "203.0.113.7:51234".parse().unwrap();
    let mut req = Request::builder()
        .method(Method::GET)
        .uri("/me")
        .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
        .header("x-session-id", "sess-42")
        .body(Body::empty())
        .unwrap();
    req.extensions_mut().insert(ConnectInfo(peer));

    let response = send(app(false), req).await;

    assert_eq!(response.status(), StatusCode::OK);
    let principal: Principal = json_body(response).await;
    assert_eq!(principal.details.remote_addr, Some(peer));
    assert_eq!(principal.details.session_id.as_deref(), Some("sess-42"));
}

#[tokio::test]
async fn test_missing_header_is_forwarded_and_rejected_downstream() {
    let response = send(app(false), request(Method::GET, "/me", None)).await;

    // The gate forwards; the AuthUser extractor finds no principal.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn test_non_bearer_schemes_are_treated_as_anonymous() {
    for value in ["Basic dXNlcjpwYXNz", "bearer abc.def.ghi", "Bearerabc.def.ghi", ""] {
        let response = send(app(false), request(Method::GET, "/me", Some(value))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "header {value:?}");
        assert!(
            !response.headers().contains_key(header::WWW_AUTHENTICATE),
            "header {value:?} should not reach the verifier"
        );
    }
}

#[tokio::test]
async fn test_invalid_token_aborts_with_401() {
    let response = send(
        app(false),
        request(Method::GET, "/me", Some("Bearer forged.token.value")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer error=\"invalid_token\""
    );
    let body: ErrorBody = json_body(response).await;
    assert_eq!(body.error.code, 401);
    assert!(body.error.message.contains("bearer token not accepted"));
}

#[tokio::test]
async fn test_missing_subject_aborts_with_distinct_error() {
    let response = send(
        app(false),
        request(Method::GET, "/me", Some("Bearer valid.but.anonymous")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorBody = json_body(response).await;
    assert_eq!(body.error.code, 500);
    assert!(body.error.message.contains("user_id"));
}

#[tokio::test]
async fn test_unknown_route_with_invalid_token_is_refused() {
    let response = send(
        app(false),
        request(Method::GET, "/does-not-exist", Some("Bearer forged.token.value")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(app(false), request(Method::GET, "/does-not-exist", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- Documentation Exposure ---

#[tokio::test]
async fn test_openapi_docs_are_public_when_enabled() {
    let response = send(app(true), request(Method::GET, "/v3/api-docs", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let doc: serde_json::Value = json_body(response).await;
    assert!(doc["paths"]["/me"].is_object());
    assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());

    // A stale token on a public documentation path is never verified.
    let response = send(
        app(true),
        request(Method::GET, "/v3/api-docs", Some("Bearer forged.token.value")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_docs_are_absent_and_secured_when_disabled() {
    let response = send(app(false), request(Method::GET, "/v3/api-docs", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        app(false),
        request(Method::GET, "/swagger-ui/index.html", Some("Bearer forged.token.value")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// --- Correlation ---

#[tokio::test]
async fn test_request_id_is_propagated() {
    let response = send(app(false), request(Method::GET, "/health", None)).await;

    assert!(response.headers().contains_key("x-request-id"));
}
