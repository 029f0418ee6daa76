// eSewa MCP Server binary
use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use esewa_mcp::mcp::MCPServer;
use esewa_mcp::{GatewaySettings, PaymentService};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries protocol frames, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("🚀 Starting eSewa MCP Server");

    let settings = GatewaySettings::from_env();
    info!(
        "Default merchant: {} ({})",
        settings.default_credentials.merchant_identity, settings.default_credentials.environment
    );
    info!(
        "Gateway timeout: {}s, lookup attempts: {}, session capacity: {}",
        settings.http_timeout.as_secs(),
        settings.lookup_retry.max_attempts,
        settings.session_capacity
    );

    let service = Arc::new(PaymentService::from_settings(&settings)?);
    MCPServer::new(service).run().await?;

    info!("MCP server shutdown");
    Ok(())
}
