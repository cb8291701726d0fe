use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use ts_rs::TS;
use utoipa::ToSchema;

/// AuthDetails
///
/// Request-derived metadata recorded alongside an authenticated identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthDetails {
    /// Peer address of the connection, when the server exposes `ConnectInfo`.
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>, example = "203.0.113.7:51234")]
    pub remote_addr: Option<SocketAddr>,
    /// Client session identifier (`x-session-id` header or `SESSION` cookie).
    pub session_id: Option<String>,
}

/// Principal
///
/// The authenticated identity attached to a single request. It never carries the
/// token or any other credential, and lives only as long as the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Principal {
    /// The subject identifier claim of the verified token.
    pub subject: String,
    /// Granted authorities. Identity-provider tokens grant none.
    pub authorities: Vec<String>,
    pub details: AuthDetails,
    #[ts(type = "string")]
    pub authenticated_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(subject: impl Into<String>, details: AuthDetails) -> Self {
        Self {
            subject: subject.into(),
            authorities: Vec::new(),
            details,
            authenticated_at: Utc::now(),
        }
    }
}

/// SecurityContext
///
/// Per-request security state, stored in the request extensions by the auth gate.
/// Empty for public endpoints and for secured endpoints called without credentials.
#[derive(Debug, Clone, Default)]
pub struct SecurityContext {
    principal: Option<Principal>,
}

impl SecurityContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}

/// AuthUser Extractor
///
/// Resolves the principal the auth gate installed for this request. This is the
/// authorization step for secured handlers: when the gate let the request through
/// without credentials, extraction fails with 401 Unauthorized before the handler runs.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SecurityContext>()
            .and_then(SecurityContext::principal)
            .cloned()
            .map(AuthUser)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_context_tracks_the_principal() {
        let empty = SecurityContext::empty();
        assert!(!empty.is_authenticated());
        assert!(empty.principal().is_none());

        let context = SecurityContext::authenticated(Principal::new("u123", AuthDetails::default()));
        assert!(context.is_authenticated());
        assert_eq!(context.principal().map(|p| p.subject.as_str()), Some("u123"));
    }
}
