mod catalog;
mod config;
mod error;
mod server;

use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use category_match::resolver::SemanticResolver;

use catalog::CatalogSource;
use config::Config;
use server::CategorySearchServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting category-search MCP server");

    let config = Config::from_env()?;
    info!(
        catalog_path = %config.catalog_path.display(),
        suggest_default_limit = config.suggest_default_limit,
        provider = ?config.reasoning.provider,
        base_url = %config.reasoning.base_url,
        model = %config.reasoning.model,
        timeout_ms = config.reasoning.timeout.as_millis(),
        max_retries = config.retry.max_retries,
        "configuration loaded"
    );

    // Fail fast on a broken catalog; tools still re-read it per call.
    let catalog = CatalogSource::new(config.catalog_path.clone());
    let categories = catalog.load().await?;
    info!(categories = categories.len(), "catalog validated");

    let resolver = SemanticResolver::from_config(config.reasoning.clone())?;
    if resolver.is_configured() {
        info!("reasoning service configured");
    } else {
        warn!("REASONING_API_KEY not set, semantic resolution will answer not_configured");
    }

    let server = CategorySearchServer::new(
        catalog,
        resolver,
        config.retry.clone(),
        config.suggest_default_limit,
    );

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    service.waiting().await?;
    info!("MCP server shut down");
    Ok(())
}
