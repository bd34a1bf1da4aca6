//! Serve command handler.
//!
//! Runs the HTTP service until interrupted.

use anyhow::Context;
use clap::Args;
use factrag_core::config::AppConfig;
use factrag_knowledge::RagService;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::server::{router, AppState};

/// Run the HTTP API
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides server.port)
    #[arg(long)]
    pub port: Option<u16>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing serve command");

        let mut server = config.server.clone();
        if let Some(ref host) = self.host {
            server.host = host.clone();
        }
        if let Some(port) = self.port {
            server.port = port;
        }

        let service = RagService::from_config(config).await?;
        let bind_addr = format!("{}:{}", server.host, server.port);
        let state = Arc::new(AppState::new(service, server));

        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;
        let addr = listener.local_addr()?;
        tracing::info!("Listening on {}", addr);

        axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
