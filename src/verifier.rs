use async_trait::async_trait;
use jsonwebtoken::{
    Algorithm, DecodingKey, Validation, decode, decode_header, errors::ErrorKind, jwk::JwkSet,
};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::{AuthConfig, KeySource};

/// VerifiedToken
///
/// The claim set of a token whose signature and registered claims (exp, iss, aud)
/// have been validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifiedToken {
    pub claims: Map<String, Value>,
}

/// VerifyError
///
/// Why a bearer token was refused by the identity provider.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("no signing key found for kid {0:?}")]
    UnknownKey(Option<String>),
    #[error("signing keys are unavailable: {0}")]
    KeySource(String),
    #[error("token rejected: {0}")]
    Rejected(String),
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => VerifyError::Expired,
            ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => VerifyError::Malformed(err.to_string()),
            _ => VerifyError::Rejected(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for VerifyError {
    fn from(err: reqwest::Error) -> Self {
        VerifyError::KeySource(err.to_string())
    }
}

/// TokenVerifier
///
/// The identity provider contract. The gate hands over the raw bearer token and
/// gets back either the verified claim set or the reason it was refused.
///
/// `Send + Sync + async_trait` keep `Arc<dyn TokenVerifier>` usable from Axum middleware.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError>;
}

pub type VerifierState = Arc<dyn TokenVerifier>;

/// build_verifier
///
/// Chooses the verifier implementation from the auth configuration.
pub fn build_verifier(config: &AuthConfig) -> Result<VerifierState, VerifyError> {
    let issuer = config.issuer.as_deref();
    let audience = config.audience.as_deref();

    let verifier: VerifierState = match &config.key_source {
        KeySource::SharedSecret(secret) => {
            Arc::new(JwtVerifier::from_secret(secret, issuer, audience))
        }
        KeySource::Jwks { url, timeout } => {
            Arc::new(JwksVerifier::new(url, issuer, audience, *timeout)?)
        }
    };
    Ok(verifier)
}

fn apply_expectations(validation: &mut Validation, issuer: Option<&str>, audience: Option<&str>) {
    validation.validate_exp = true;
    if let Some(issuer) = issuer {
        validation.set_issuer(&[issuer]);
    }
    match audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }
}

fn decode_claims(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<VerifiedToken, VerifyError> {
    let data = decode::<Map<String, Value>>(token, key, validation)?;
    Ok(VerifiedToken {
        claims: data.claims,
    })
}

// --- Shared Secret (HS256) ---

/// JwtVerifier
///
/// Verifies HS256 tokens signed with a secret shared with the identity provider.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn from_secret(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        apply_expectations(&mut validation, issuer, audience);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        decode_claims(token, &self.key, &self.validation)
    }
}

// --- Remote Key Set (JWKS) ---

/// Asymmetric algorithms accepted from a JWKS provider. HMAC is refused so a
/// public key can never be used as a shared secret.
const JWKS_ALGORITHMS: [Algorithm; 9] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Minimum interval between two fetches of the key set.
pub const JWKS_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

/// JwksVerifier
///
/// Verifies tokens signed by an external identity provider (Firebase, Auth0, any OIDC
/// issuer) whose public keys are published as a JSON Web Key Set.
///
/// Keys are cached by `kid`. An unknown `kid` triggers a refetch of the key set, which
/// covers provider key rotation without polling. Refetches are single-flight and at
/// most one per cooldown window: concurrent misses wait for the fetch in progress, and
/// a miss inside the window fails with `UnknownKey` without contacting the provider.
pub struct JwksVerifier {
    client: reqwest::Client,
    url: String,
    validation: Validation,
    refresh_cooldown: Duration,
    keys: RwLock<HashMap<String, DecodingKey>>,
    // Held for the whole fetch; records when the last one started.
    last_refresh: Mutex<Option<Instant>>,
}

impl JwksVerifier {
    pub fn new(
        url: &str,
        issuer: Option<&str>,
        audience: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let mut validation = Validation::new(Algorithm::RS256);
        apply_expectations(&mut validation, issuer, audience);

        Ok(Self {
            client,
            url: url.to_string(),
            validation,
            refresh_cooldown: JWKS_REFRESH_COOLDOWN,
            keys: RwLock::new(HashMap::new()),
            last_refresh: Mutex::new(None),
        })
    }

    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, DecodingKey>, VerifyError> {
        debug!(url = %self.url, "Fetching JWKS");

        let set: JwkSet = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut keys = HashMap::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(err) => warn!(kid = %kid, error = %err, "Ignoring unusable JWK"),
            }
        }

        debug!(count = keys.len(), "JWKS loaded");
        Ok(keys)
    }

    async fn cached(&self, kid: &str) -> Option<DecodingKey> {
        self.keys.read().await.get(kid).cloned()
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, VerifyError> {
        if let Some(key) = self.cached(kid).await {
            return Ok(key);
        }

        let mut last_refresh = self.last_refresh.lock().await;

        // Another request may have refreshed while this one waited.
        if let Some(key) = self.cached(kid).await {
            return Ok(key);
        }

        if last_refresh.is_some_and(|at| at.elapsed() < self.refresh_cooldown) {
            debug!(kid, "Unknown kid inside the JWKS refresh cooldown");
            return Err(VerifyError::UnknownKey(Some(kid.to_string())));
        }

        // Failed fetches count too, so an unreachable provider is not hammered.
        *last_refresh = Some(Instant::now());
        let fresh = self.fetch_keys().await?;
        let key = fresh.get(kid).cloned();
        *self.keys.write().await = fresh;

        key.ok_or_else(|| VerifyError::UnknownKey(Some(kid.to_string())))
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        let header = decode_header(token)?;

        if !JWKS_ALGORITHMS.contains(&header.alg) {
            return Err(VerifyError::Rejected(format!(
                "algorithm {:?} is not accepted",
                header.alg
            )));
        }

        let kid = header.kid.ok_or(VerifyError::UnknownKey(None))?;
        let key = self.key_for(&kid).await?;

        let mut validation = self.validation.clone();
        validation.algorithms = vec![header.alg];
        decode_claims(token, &key, &validation)
    }
}

// --- In-Memory Verifier ---

/// MockTokenVerifier
///
/// In-memory verifier mapping opaque tokens to claim sets. Used by the test suite to
/// drive the gate without signing real tokens. Unknown tokens fail with
/// `VerifyError::InvalidSignature`.
#[derive(Default)]
pub struct MockTokenVerifier {
    tokens: HashMap<String, Map<String, Value>>,
}

impl MockTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` as valid. Non-object `claims` register an empty claim set.
    pub fn with_token(mut self, token: impl Into<String>, claims: Value) -> Self {
        let claims = match claims {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.tokens.insert(token.into(), claims);
        self
    }
}

#[async_trait]
impl TokenVerifier for MockTokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        self.tokens
            .get(token)
            .cloned()
            .map(|claims| VerifiedToken { claims })
            .ok_or(VerifyError::InvalidSignature)
    }
}
