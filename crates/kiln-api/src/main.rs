//! kiln API server and build workers

use anyhow::Context;
use kiln_api::services::catalog::seed;
use kiln_api::{AppState, routes};
use kiln_config::{CatalogFile, SystemConfig, load_system_config};
use kiln_core::RetryPolicy;
use kiln_db::{create_pool, run_migrations};
use kiln_orchestration::KubernetesOrchestrator;
use kiln_scheduler::{BuildLifecycle, LifecycleSettings, spawn_workers};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "kiln.kdl";

fn load_config() -> anyhow::Result<SystemConfig> {
    let (path, explicit) = match std::env::var("KILN_CONFIG") {
        Ok(path) => (PathBuf::from(path), true),
        Err(_) => (PathBuf::from(DEFAULT_CONFIG), false),
    };

    let mut config = if explicit || path.exists() {
        info!(path = %path.display(), "Loading configuration");
        load_system_config(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        SystemConfig::default()
    };

    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = Some(url);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;

    let state = match &config.database.url {
        Some(url) => {
            info!("Connecting to database...");
            let pool = create_pool(url, config.database.max_connections).await?;
            run_migrations(&pool).await?;
            info!("Database connected");
            AppState::postgres(pool)
        }
        None => {
            warn!("No database configured, using in-memory stores");
            AppState::in_memory()
        }
    }
    .with_retry(RetryPolicy::new(
        config.retry.max_attempts,
        config.retry.delay,
    ));

    state.engines.validate()?;

    if let Some(path) = &config.catalog {
        let file = CatalogFile::load(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?;
        let (templates, components) = seed(&state, file).await?;
        info!(templates, components, "Catalog loaded");
    }

    // Start workers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = match KubernetesOrchestrator::new().await {
        Ok(orchestrator) => {
            let settings = LifecycleSettings {
                lock_timeout: chrono::Duration::from_std(config.scheduler.lock_timeout)
                    .context("scheduler.lock-timeout-ms is out of range")?,
                engine: config.scheduler.engine.clone(),
                namespace: config.orchestration.namespace.clone(),
                builder_image: config.orchestration.builder_image.clone(),
                builder_command: config.orchestration.builder_command.clone(),
            };
            state.engines.create(&settings.engine)?;

            let lifecycle = Arc::new(BuildLifecycle::new(
                state.queue.clone(),
                state.components.clone(),
                state.templates.clone(),
                state.logs.clone(),
                Arc::new(orchestrator),
                settings,
            ));
            let prefix = config
                .scheduler
                .worker_id
                .clone()
                .unwrap_or_else(|| format!("kiln-{}", std::process::id()));
            spawn_workers(
                config.scheduler.workers,
                &prefix,
                lifecycle,
                config.scheduler.poll_interval,
                shutdown_rx,
            )
        }
        Err(e) => {
            warn!(error = %e, "Kubernetes unavailable, starting without build workers");
            Vec::new()
        }
    };

    // Build router
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let listener = TcpListener::bind(&config.server.listen).await?;
    info!("Starting server on {}", config.server.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    for worker in workers {
        worker.await?;
    }

    Ok(())
}
