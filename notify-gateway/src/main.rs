//! Notify Gateway - WeChat Pay notification relay.
//!
//! This binary:
//! - Loads config and the WeChat Pay platform public key
//! - Verifies every notification posted to `/notify`
//! - Forwards the raw request to the configured or `attach`-declared targets
//! - Acknowledges with 204 only when all forwards succeeded

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notify_gateway::web::routes;
use notify_gateway::{router, ApiV3Key, AppState, Config, Forwarder, NotifyVerifier, VerificationKey};

#[tokio::main]
async fn main() -> Result<()> {
    // Config comes first: the debug flag picks the default log level
    let config = Config::load().context("Failed to load config")?;

    // Initialize structured JSON logging
    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("notify_gateway_starting");

    config.validate().context("Invalid config")?;
    let addr = config.socket_addr()?;
    let targets = config.forward_targets()?;

    info!(
        address = %addr,
        debug = config.debug,
        public_key_id = %config.wechat.public_key_id,
        forward_count = targets.len(),
        forward_timeout_ms = config.forward.timeout_ms,
        forward_retries = config.forward.retries,
        "config_loaded"
    );

    // Key material is loaded once; failure here is fatal
    let key = VerificationKey::load(&config.wechat.public_key_id, &config.wechat.public_key)
        .context("Failed to load wechat pay public key")?;
    let api_v3_key = ApiV3Key::try_from(config.wechat.api_v3_key.as_str())?;
    let verifier = NotifyVerifier::new(key, api_v3_key, config.wechat.signature_max_age);

    let forwarder = Forwarder::new(&config.forward).context("Failed to build HTTP client")?;

    let state = AppState::new(verifier, forwarder, targets);
    let app = router(state);

    if config.debug {
        for route in routes() {
            info!(method = %route.method(), path = route.path(), "route_registered");
        }
    }

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "notify_gateway_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("notify_gateway_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("notify_gateway_shutting_down");
}
