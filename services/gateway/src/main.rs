use anyhow::Context;
use avatar_gateway::config::Config;
use avatar_gateway::routes::{AppState, build_router};
use avatar_gateway::upstream::Upstream;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load gateway configuration")?;

    // Initialize the tracing subscriber for logging.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let addr = config.bind_address;
    let app = build_router(AppState::new(Upstream::new(config)));

    info!("Starting avatar gateway, listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
