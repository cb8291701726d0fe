use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;

use crate::{
    auth::{AuthDetails, Principal, SecurityContext},
    classifier::EndpointClassifier,
    models::ErrorBody,
    verifier::{VerifierState, VerifyError},
};

/// Case-sensitive scheme prefix of the `Authorization` header, single space included.
pub const BEARER_PREFIX: &str = "Bearer ";
/// Header carrying the client session identifier.
pub const SESSION_HEADER: &str = "x-session-id";
const SESSION_COOKIE: &str = "SESSION";

/// GateError
///
/// A request the gate must stop: its credentials were presented but cannot be accepted.
#[derive(Debug, Error)]
pub enum GateError {
    /// The token could not be accepted: refused by the identity provider (expired,
    /// malformed, bad signature...) or not checkable because its keys are unavailable.
    #[error("bearer token not accepted: {0}")]
    InvalidToken(#[from] VerifyError),
    /// The token verified but carries no subject. The provider broke its contract,
    /// so this is a server fault rather than a client one.
    #[error("verified token has no `{claim}` claim")]
    MissingSubject { claim: String },
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            // The token may well be valid; the client should retry, not discard it.
            GateError::InvalidToken(VerifyError::KeySource(_)) => StatusCode::SERVICE_UNAVAILABLE,
            GateError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            GateError::MissingSubject { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(ErrorBody::new(status, self.to_string()))).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer error=\"invalid_token\""),
            );
        }
        response
    }
}

/// GateOutcome
///
/// The gate's decision for one request.
#[derive(Debug)]
pub enum GateOutcome {
    /// The endpoint is on the public allow-list; no credentials were looked at.
    Public,
    /// Secured endpoint without usable bearer credentials. The request proceeds and
    /// the handler's `AuthUser` extractor rejects it.
    Unauthenticated,
    Authenticated(Principal),
    /// Credentials were presented and refused. The request does not proceed.
    Invalid(GateError),
}

/// AuthGate
///
/// Per-request authentication: classifies the endpoint, verifies bearer tokens on
/// secured endpoints and resolves the principal. Built once by the composition root.
pub struct AuthGate {
    classifier: Arc<EndpointClassifier>,
    verifier: VerifierState,
    subject_claim: String,
}

impl AuthGate {
    pub fn new(
        classifier: Arc<EndpointClassifier>,
        verifier: VerifierState,
        subject_claim: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            verifier,
            subject_claim: subject_claim.into(),
        }
    }

    pub fn classifier(&self) -> &EndpointClassifier {
        &self.classifier
    }

    /// authenticate
    ///
    /// Single pass, no retries:
    /// 1. Public endpoint → `Public`.
    /// 2. No `Authorization: Bearer ...` header → `Unauthenticated`.
    /// 3. Token refused by the verifier → `Invalid(InvalidToken)`.
    /// 4. Token without a subject claim → `Invalid(MissingSubject)`.
    /// 5. Otherwise → `Authenticated` with a principal built from the subject and the
    ///    request details.
    pub async fn authenticate(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        remote_addr: Option<SocketAddr>,
    ) -> GateOutcome {
        if self.classifier.is_public(method, path) {
            tracing::trace!(%method, path, "Public endpoint, skipping authentication");
            return GateOutcome::Public;
        }

        let Some(token) = bearer_token(headers) else {
            tracing::debug!(%method, path, "No bearer token on secured endpoint");
            return GateOutcome::Unauthenticated;
        };

        let verified = match self.verifier.verify(token).await {
            Ok(verified) => verified,
            Err(err) => {
                tracing::warn!(%method, path, error = %err, "Bearer token rejected");
                return GateOutcome::Invalid(GateError::InvalidToken(err));
            }
        };

        let Some(subject) = subject_claim(&verified.claims, &self.subject_claim) else {
            tracing::error!(
                %method,
                path,
                claim = %self.subject_claim,
                "Verified token carries no subject claim"
            );
            return GateOutcome::Invalid(GateError::MissingSubject {
                claim: self.subject_claim.clone(),
            });
        };

        let details = AuthDetails {
            remote_addr,
            session_id: session_id(headers),
        };

        tracing::debug!(%method, path, subject = %subject, "Request authenticated");
        GateOutcome::Authenticated(Principal::new(subject, details))
    }
}

/// auth_gate
///
/// Axum middleware running `AuthGate::authenticate` for every request. Installs the
/// resulting `SecurityContext` in the request extensions and forwards, unless the
/// credentials were refused, in which case the `GateError` response is returned.
pub async fn auth_gate(State(gate): State<Arc<AuthGate>>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let outcome = gate
        .authenticate(&parts.method, parts.uri.path(), &parts.headers, remote_addr)
        .await;

    let context = match outcome {
        GateOutcome::Public | GateOutcome::Unauthenticated => SecurityContext::empty(),
        GateOutcome::Authenticated(principal) => SecurityContext::authenticated(principal),
        GateOutcome::Invalid(err) => return err.into_response(),
    };

    tracing::trace!(
        authenticated = context.is_authenticated(),
        "Security context installed"
    );
    parts.extensions.insert(context);
    next.run(Request::from_parts(parts, body)).await
}

/// Returns the raw token of an `Authorization: Bearer <token>` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
}

/// String or numeric claims are accepted as subjects. Empty strings are not.
fn subject_claim(claims: &serde_json::Map<String, Value>, claim: &str) -> Option<String> {
    match claims.get(claim)? {
        Value::String(subject) if !subject.is_empty() => Some(subject.clone()),
        Value::Number(subject) => Some(subject.to_string()),
        _ => None,
    }
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    if let Some(id) = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|id| !id.is_empty())
    {
        return Some(id.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
