//! Trivia Cache - caching engine for the trivia backend
//!
//! Serves the cache management API plus a policy-cached catalog route.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{http::Method, middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trivia_cache::identity::attach_identity;
use trivia_cache::storage::{BackendKind, RedisBackend};
use trivia_cache::{
    cache_interceptor, create_router, spawn_cleanup_task, AppState, CacheLayer, CachePolicy,
    Config, PolicyRegistry, StorageEngine,
};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the remote backend, falling back to memory
/// 4. Start the background cleanup task (memory backend only)
/// 5. Build the management and catalog routers
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trivia_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Trivia Cache Server");

    let config = Config::from_env();
    info!(
        prefix = %config.prefix,
        default_ttl = config.default_ttl,
        port = config.server_port,
        cleanup_interval = config.cleanup_interval,
        remote = config.redis_url.is_some(),
        "Configuration loaded"
    );

    let engine = Arc::new(build_engine(&config).await);

    let cleanup_handle = (engine.backend_kind() == BackendKind::Memory).then(|| {
        spawn_cleanup_task(
            engine.clone(),
            config.cleanup_interval,
            config.cleanup_options(),
        )
    });

    let app = create_router(AppState::new(engine.clone())).merge(catalog_router(engine.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
    engine.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

async fn build_engine(config: &Config) -> StorageEngine {
    let Some(url) = &config.redis_url else {
        return StorageEngine::memory(config.storage());
    };

    match RedisBackend::connect(url).await {
        Ok(backend) => StorageEngine::with_backend(config.storage(), Box::new(backend)),
        Err(e) => {
            warn!(error = %e, "Redis unavailable, falling back to the memory backend");
            StorageEngine::memory(config.storage())
        }
    }
}

/// Credit package catalog, cached for a minute per caller and query.
fn catalog_router(engine: Arc<StorageEngine>) -> Router {
    let policies = PolicyRegistry::new().route(
        Method::GET,
        "/credits/packages",
        CachePolicy::ttl(60).tag("credits"),
    );

    Router::new()
        .route("/credits/packages", get(credit_packages))
        .layer(middleware::from_fn_with_state(
            CacheLayer::new(engine, policies),
            cache_interceptor,
        ))
        .layer(middleware::from_fn(attach_identity))
}

async fn credit_packages() -> Json<Value> {
    Json(json!({
        "packages": [
            {"id": "starter", "credits": 100, "price_cents": 99},
            {"id": "standard", "credits": 550, "price_cents": 499},
            {"id": "premium", "credits": 1200, "price_cents": 999}
        ]
    }))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
