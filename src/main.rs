use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use ticker_agent::config::ServerConfig;
use ticker_agent::market_data::{MarketData, YahooFinance};
use ticker_agent::providers::OpenAIProvider;
use ticker_agent::{LoggingHooks, ToolRegistry, builder, register_finance_tools, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // default level is info
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    let api_key = config.resolve_api_key()?;

    let provider = OpenAIProvider::with_base_url(api_key, config.model.clone(), config.base_url.clone());
    let market_data: Arc<dyn MarketData> = Arc::new(
        YahooFinance::with_base_url(config.market_data_url.clone())
            .context("failed to build market data client")?,
    );

    let mut tools = ToolRegistry::new();
    register_finance_tools(&mut tools, &market_data)?;

    let agent = builder()
        .provider(provider)
        .tools(tools)
        .hooks(LoggingHooks)
        .config(config.agent_config())
        .build();

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    log::info!(
        "Listening on {address} model={} base_url={} max_iterations={}",
        config.model,
        config.base_url,
        config.max_iterations
    );

    axum::serve(listener, server::router(Arc::new(agent)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received, draining connections");
}
