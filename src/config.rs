use std::{env, time::Duration};

/// Fallback HS256 secret for local development only.
pub const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// Claim carrying the user identifier in identity-provider tokens.
pub const DEFAULT_SUBJECT_CLAIM: &str = "user_id";

/// AppConfig
///
/// Holds the application's configuration state. Loaded once at startup and
/// immutable afterwards; shared through `AppState` via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls defaults and fail-fast checks.
    pub env: Env,
    // Socket address the HTTP listener binds to.
    pub bind_addr: String,
    // Serves Swagger UI / OpenAPI JSON and marks both public.
    pub openapi_enabled: bool,
    // Name of the token claim resolved into the principal's subject.
    pub subject_claim: String,
    // How bearer tokens are verified.
    pub auth: AuthConfig,
}

/// Env
///
/// Defines the runtime context: relaxed defaults locally, explicit secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Env {
    pub fn as_str(&self) -> &'static str {
        match self {
            Env::Local => "local",
            Env::Production => "production",
        }
    }
}

/// AuthConfig
///
/// Token verification settings: where signing keys come from and which registered
/// claims must match.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub key_source: KeySource,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum KeySource {
    /// HS256 secret shared with the identity provider.
    SharedSecret(String),
    /// Public keys published by the identity provider as a JWKS document.
    Jwks { url: String, timeout: Duration },
}

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for test setup, so no environment variables are needed.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:3000".to_string(),
            openapi_enabled: true,
            subject_claim: DEFAULT_SUBJECT_CLAIM.to_string(),
            auth: AuthConfig {
                key_source: KeySource::SharedSecret(LOCAL_JWT_SECRET.to_string()),
                issuer: None,
                audience: None,
            },
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables (after `.env` has been applied).
    ///
    /// # Panics
    /// Panics in production when neither `JWKS_URL` nor `JWT_SECRET` is set, so the
    /// service never starts with a guessable signing secret.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        // Docs are exposed by default only while developing.
        let openapi_enabled = env_flag("OPENAPI_ENABLED").unwrap_or(env == Env::Local);

        let subject_claim = env::var("AUTH_SUBJECT_CLAIM")
            .ok()
            .filter(|claim| !claim.is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT_CLAIM.to_string());

        let key_source = match env::var("JWKS_URL").ok().filter(|url| !url.is_empty()) {
            Some(url) => {
                let timeout = env::var("JWKS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|secs| secs.parse().ok())
                    .unwrap_or(5);
                KeySource::Jwks {
                    url,
                    timeout: Duration::from_secs(timeout),
                }
            }
            None => {
                let secret = match env {
                    Env::Production => env::var("JWT_SECRET")
                        .expect("FATAL: JWT_SECRET or JWKS_URL must be set in production."),
                    Env::Local => {
                        env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string())
                    }
                };
                KeySource::SharedSecret(secret)
            }
        };

        Self {
            env,
            bind_addr,
            openapi_enabled,
            subject_claim,
            auth: AuthConfig {
                key_source,
                issuer: non_empty_var("JWT_ISSUER"),
                audience: non_empty_var("JWT_AUDIENCE"),
            },
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

/// Parses a boolean flag. Unset or unrecognised values yield `None`.
fn env_flag(name: &str) -> Option<bool> {
    match env::var(name).ok()?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
