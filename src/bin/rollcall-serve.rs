#![forbid(unsafe_code)]

use rollcalld::config::ServeConfig;
use rollcalld::serve::build_router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = ServeConfig::from_env();
    if !config.dist_dir.join("index.html").is_file() {
        tracing::warn!(dist = %config.dist_dir.display(), "index.html missing from dist dir");
    }
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(
        %addr,
        dist = %config.dist_dir.display(),
        version = %config.version,
        "serving dashboard assets"
    );
    axum::serve(listener, build_router(config)).await?;
    Ok(())
}
