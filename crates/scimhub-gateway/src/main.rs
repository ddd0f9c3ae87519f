//! scimhub HTTP gateway binary.

use std::sync::Arc;

use clap::Parser;
use scimhub_core::{MemoryStore, PushDispatcher, Router, SledStore, Store};
use scimhub_gateway::{create_router, AppState, Args, GatewayConfig, WebhookTransport};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scimhub_gateway=info,scimhub_core=info")),
        )
        .init();

    // Parse command line args
    let args = Args::parse();
    let config = GatewayConfig::from(&args);

    info!(
        listen = %config.listen_addr,
        data = ?config.data_path,
        "Starting scimhub gateway"
    );

    let store: Arc<dyn Store> = match config.store_config() {
        Some(store_config) => {
            let store = SledStore::open(store_config)?;
            if store.was_recovered() {
                info!(
                    feeds = store.feed_count(),
                    subscribers = store.subscriber_count(),
                    "Recovered existing store"
                );
            }
            Arc::new(store)
        }
        None => Arc::new(MemoryStore::new()),
    };

    let transport = Arc::new(WebhookTransport::new(config.push_timeout)?);
    let push = PushDispatcher::start(transport, config.dispatch_config());

    let router = Router::new(store, push);
    router.load()?;

    let state = AppState::new(router, config.clone());

    if let Some(interval) = config.compaction_interval {
        let router = state.router.clone();
        let policy = config.retention_policy();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let router = router.clone();
                let policy = policy.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || router.compact(&policy)).await {
                    tracing::warn!(error = %e, "compaction task failed");
                }
            }
        });
        info!(interval_secs = interval.as_secs(), "Feed compaction enabled");
    }

    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Gateway listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
