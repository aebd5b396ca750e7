use std::sync::Arc;

use anyhow::Context;

use connector_api::app::{self, services};
use connector_infra::ConnectorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    connector_observability::init();

    let config = ConnectorConfig::from_env().context("failed to load configuration")?;
    let services = Arc::new(
        services::build_services(&config).context("failed to build connector services")?,
    );
    let sweeper = services.manager().spawn_sweeper();

    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
