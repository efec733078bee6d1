use clap::Parser;
use crowdcompute_coordinator::config::{Cli, CoordinatorConfig};
use crowdcompute_coordinator::state::AppState;
use crowdcompute_coordinator::storage::ArtifactStore;
use crowdcompute_coordinator::build_router;
use crowdcompute_engine::{Engine, EngineConfig, PluginRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbosity = cli.verbose;
    let config = CoordinatorConfig::resolve(cli);

    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();

    let store = ArtifactStore::new(config.storage_root.clone());
    store.ensure_dirs().await?;

    let mut registry = PluginRegistry::new();
    for plugin in crowdcompute_plugins::all_plugins() {
        registry.register(plugin);
    }

    let engine_config = EngineConfig {
        base_url: config.base_url.clone(),
        storage_root: config.storage_root.clone(),
        lease_duration: Duration::from_secs(config.lease_seconds),
    };
    let engine = Engine::new(registry, engine_config);

    let state = Arc::new(AppState { engine, store, base_url: config.base_url.clone() });

    spawn_reclaimer(state.clone(), config.reclaim_interval);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(bind = %config.bind, base_url = %config.base_url, "coordinator listening");

    let router = build_router(state);
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

fn spawn_reclaimer(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let reclaimed = state.engine.reclaim_expired();
            if reclaimed > 0 {
                tracing::info!(reclaimed, "reclaimed expired leases");
            }
        }
    });
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
