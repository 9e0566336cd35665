//! Authorizer
//!
//! Runs inside the Lambda custom runtime when `AWS_LAMBDA_RUNTIME_API` is
//! set, otherwise as a standalone HTTP service.

use authorizer::auth::{JwksClient, JwtValidator};
use authorizer::config::{Config, LAMBDA_RUNTIME_API_VAR};
use authorizer::decision::DecisionEngine;
use authorizer::errors::AuthorizerError;
use authorizer::observability::metrics::init_metrics_recorder;
use authorizer::routes::{self, AppState};
use authorizer::runtime::{self, LambdaRuntime};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting authorizer");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            let error = AuthorizerError::from(e);
            let runtime_api = std::env::var(LAMBDA_RUNTIME_API_VAR)
                .ok()
                .filter(|value| !value.trim().is_empty());
            if let Some(runtime_api) = runtime_api {
                if let Err(report_err) = runtime::report_init_error_to(&runtime_api, &error).await {
                    error!("Failed to report init error: {}", report_err);
                }
            }
            return Err(error.into());
        }
    };

    info!(
        issuer = %config.issuer,
        audience = %config.audience,
        algorithm = ?config.algorithm,
        jwks_url = config.jwks_url.as_deref().unwrap_or("(discovered)"),
        clock_skew_seconds = config.clock_skew_seconds,
        "Configuration loaded successfully"
    );

    let jwks_client = Arc::new(JwksClient::from_config(&config));
    let validator = JwtValidator::new(jwks_client, config.validator_config());
    let engine = Arc::new(DecisionEngine::new(validator));

    match config.lambda_runtime_api.clone() {
        Some(runtime_api) => {
            info!(runtime_api = %runtime_api, "Running under the Lambda runtime");
            LambdaRuntime::new(&runtime_api, engine).run().await?;
        }
        None => serve_http(config, engine).await?,
    }

    Ok(())
}

fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authorizer=info,tower_http=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn serve_http(
    config: Config,
    engine: Arc<DecisionEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState { engine, config });
    let app = routes::build_routes(state, metrics_handle);

    info!("Authorizer listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Authorizer shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
