// foliod: daemon entry point.

use anyhow::Context;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = folio_server::config::ServerConfig::load();
    info!("starting folio daemon");
    folio_server::runtime::run(config).await.context("daemon terminated unexpectedly")
}
