//! Toolgate Server Entry Point
//!
//! Bootstraps configuration, selects the spec store (Postgres when
//! `DATABASE_URL` is set, directory scan otherwise), performs the initial
//! load, starts the reconciler and session sweeper, and serves until
//! SIGINT/SIGTERM with a bounded drain window.

use std::net::SocketAddr;
use std::sync::Arc;

use toolgate_api::{
    create_api_router, init_tracing, ApiError, ApiResult, AppState, FileSpecStore, GatewayConfig,
    MountTable, PgConfig, PgSpecStore, Reconciler, SpecStore, TelemetryConfig,
};
use toolgate_openapi::OperationFilter;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default());

    let config = Arc::new(GatewayConfig::from_env());
    let store = select_store(&config).await?;

    let mounts = Arc::new(MountTable::new());
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        mounts.clone(),
        config.clone(),
        operation_filter(&config),
    ));

    match reconciler.initial_load().await {
        Ok(mounted) => tracing::info!(mounted, "initial spec load complete"),
        Err(err) => {
            // A dead store at startup is fatal unless files can stand in.
            tracing::error!(error = %err, "initial load failed");
            return Err(err);
        }
    }

    let state = AppState::new(store, mounts, reconciler.clone(), config.clone());

    tokio::spawn(reconciler.run());
    tokio::spawn(state.sessions.clone().run_sweeper());

    let app = create_api_router(state);
    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.bind_port)
        .parse()
        .map_err(|e| ApiError::validation(format!("Invalid bind address: {}", e)))?;

    tracing::info!(%addr, "Starting Toolgate gateway");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    let grace = config.shutdown_grace;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(grace))
        .await
        .map_err(|e| ApiError::internal(format!("Server error: {}", e)))?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Ingest filter from configuration. Invalid regexes are dropped with a
/// warning rather than refusing to start.
fn operation_filter(config: &GatewayConfig) -> OperationFilter {
    let compile = |name: &str, pattern: &Option<String>| {
        pattern.as_deref().and_then(|raw| match regex::Regex::new(raw) {
            Ok(re) => Some(re),
            Err(err) => {
                tracing::warn!(filter = %name, error = %err, "ignoring invalid filter regex");
                None
            }
        })
    };
    OperationFilter {
        tag: config.filter_tag.clone(),
        include_description: compile("TOOLGATE_FILTER_INCLUDE", &config.filter_include),
        exclude_description: compile("TOOLGATE_FILTER_EXCLUDE", &config.filter_exclude),
        allow_operations: config.filter_operations.as_deref().map(|raw| {
            raw.split(',')
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect()
        }),
    }
}

/// Store-backed when `DATABASE_URL` is set; file fallback otherwise. When the
/// store is unreachable at startup, fall back to files if any are present,
/// otherwise refuse to start.
async fn select_store(config: &GatewayConfig) -> ApiResult<Arc<dyn SpecStore>> {
    let file_store = FileSpecStore::new(&config.spec_dir);

    let Some(database_url) = &config.database_url else {
        tracing::info!(dir = %config.spec_dir, "no DATABASE_URL, using file-based specs");
        return Ok(Arc::new(file_store));
    };

    match PgSpecStore::connect(&PgConfig::new(database_url)).await {
        Ok(store) => {
            tracing::info!("connected to spec store");
            Ok(Arc::new(store))
        }
        Err(err) if file_store.has_specs() => {
            tracing::warn!(
                error = %err,
                dir = %config.spec_dir,
                "spec store unreachable, falling back to file-based specs"
            );
            Ok(Arc::new(file_store))
        }
        Err(err) => Err(ApiError::unavailable(format!(
            "spec store unreachable and no local spec files found: {}",
            err
        ))),
    }
}

/// Resolves on SIGINT or SIGTERM. Once signalled, a watchdog enforces the
/// drain window so a wedged connection cannot hold shutdown forever.
async fn shutdown_signal(grace: std::time::Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received, draining"),
        _ = terminate => tracing::info!("SIGTERM received, draining"),
    }

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        tracing::warn!(?grace, "drain window elapsed, terminating");
        std::process::exit(0);
    });
}
