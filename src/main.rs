use api_gate::{
    config::{AppConfig, Env, KeySource},
    create_router,
    verifier::build_verifier,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: loads configuration, initializes logging, builds the token verifier
/// and the router, then serves HTTP.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging. RUST_LOG wins over the development defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "api_gate=debug,tower_http=info,axum=trace".into());

    // Pretty output locally, JSON for log aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Identity provider.
    match &config.auth.key_source {
        KeySource::SharedSecret(_) => tracing::info!("Verifying bearer tokens with a shared HS256 secret"),
        KeySource::Jwks { url, .. } => tracing::info!(%url, "Verifying bearer tokens against JWKS"),
    }
    let verifier = build_verifier(&config.auth)
        .expect("FATAL: Failed to initialize the token verifier.");

    // 4. Router and server startup. The endpoint classifier is built here, before
    // the listener accepts connections.
    let bind_addr = config.bind_addr.clone();
    let openapi_enabled = config.openapi_enabled;
    let app = create_router(config, verifier);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    if openapi_enabled {
        tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");
    }

    // ConnectInfo feeds the peer address into each principal's details.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("FATAL: HTTP server terminated unexpectedly.");
}
