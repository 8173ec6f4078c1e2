use anyhow::Context;

use loyalty_api::{app, config::AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    loyalty_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let services = app::build_services(&config).await?;
    let app = app::build_app(services, &config.internal_api_key);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
