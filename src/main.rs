use std::sync::Arc;

use anyhow::Context;
use product_gateway::{api, telemetry, GatewayConfig, HttpProductClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config = GatewayConfig::from_env().context("loading configuration")?;
    let client = HttpProductClient::new(config.upstream.clone())
        .context("building upstream client")?;

    let app = api::router(Arc::new(client));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        upstream = %config.upstream.base_url,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
