//! MinimalForwarder relayer HTTP entrypoint.
//!
//! This binary launches an Axum-based HTTP server that verifies EIP-712 signed forward
//! requests and executes them on-chain from a funded relayer account.
//!
//! Endpoints:
//! - `GET /` – Endpoint documentation
//! - `GET /health` – Liveness with the configured forwarder and resolved chain id
//! - `POST /relay` – Verify and execute a signed forward request
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `RPC_URL`, `RELAYER_PRIVATE_KEY`, `FORWARDER_ADDRESS` are required
//! - `HOST`, `PORT` control binding address
//! - `CONFIG_FILE` points at the optional TOML configuration
//! - `RUST_LOG`, `LOG_FORMAT` control logging

use axum::Router;
use axum::http::Method;
use dotenvy::dotenv;
use std::sync::Arc;
use tower_http::cors;

use forwarder_relayer::chain::evm::EvmForwarder;
use forwarder_relayer::config::RelayerConfig;
use forwarder_relayer::from_env::RelayerEnv;
use forwarder_relayer::handlers;
use forwarder_relayer::relay::{RelayPolicy, Relayer};
use forwarder_relayer::sig_down::SigDown;
use forwarder_relayer::telemetry::Telemetry;

/// Initializes the relayer server.
///
/// - Loads `.env` variables.
/// - Initializes tracing.
/// - Builds the forwarder provider; the chain id is resolved in the background.
/// - Starts an Axum HTTP server with the relay handlers.
///
/// Any configuration error exits with status 1 before the listener is bound.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env variables
    dotenv().ok();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let app_config = match RelayerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let env = match RelayerEnv::from_env() {
        Ok(env) => env,
        Err(e) => {
            tracing::error!("Invalid environment: {}", e);
            std::process::exit(1);
        }
    };
    let addr = env.socket_addr();
    tracing::info!(
        forwarder = %env.forwarder_address,
        relayer = %env.relayer_address(),
        "Relayer configured"
    );

    let forwarder = match EvmForwarder::try_new(
        env.signer,
        env.rpc_url,
        env.forwarder_address,
        &app_config.transaction,
        app_config.relay.expected_chain_id,
    ) {
        Ok(forwarder) => forwarder,
        Err(e) => {
            tracing::error!("Failed to create forwarder provider: {}", e);
            std::process::exit(1);
        }
    };
    let relayer = Arc::new(Relayer::new(
        forwarder,
        RelayPolicy::from(&app_config.relay),
    ));

    // Resolve the chain id without holding up the listener.
    let probe = Arc::clone(&relayer);
    tokio::spawn(async move { probe.chain().probe().await });

    // Configure CORS
    let cors_layer = if app_config.cors.allowed_origins.is_empty() {
        tracing::info!("CORS: Allowing all origins (*)");
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any)
    } else {
        tracing::info!("CORS: Restricting to {:?}", app_config.cors.allowed_origins);
        let origins: Vec<_> = app_config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors::CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any)
    };

    let http_endpoints = Router::new()
        .merge(handlers::routes().with_state(relayer))
        .layer(tower_http::limit::RequestBodyLimitLayer::new(
            app_config.request.max_body_size_bytes,
        ))
        .layer(telemetry.http_tracing())
        .layer(cors_layer);

    tracing::info!("Starting server at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        });

    let sig_down = SigDown::try_new()?;
    let axum_cancellation_token = sig_down.cancellation_token();
    let axum_graceful_shutdown = async move { axum_cancellation_token.cancelled().await };
    axum::serve(listener, http_endpoints)
        .with_graceful_shutdown(axum_graceful_shutdown)
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
