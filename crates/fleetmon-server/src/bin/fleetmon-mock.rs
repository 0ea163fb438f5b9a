use anyhow::{Context, Result};
use fleetmon_server::mock::{self, DEFAULT_ADDR, DEFAULT_MACHINE_COUNT};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fleetmon=info".parse()?))
        .init();

    let addr = std::env::var("FLEETMON_MOCK_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind mock endpoint on {addr}"))?;
    tracing::info!(addr = %addr, machines = DEFAULT_MACHINE_COUNT, "Mock metrics endpoint listening");

    axum::serve(listener, mock::router(DEFAULT_MACHINE_COUNT))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}
