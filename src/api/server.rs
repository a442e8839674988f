//! API server setup

use super::{handlers::AppState, routes::create_router};
use crate::config::ServerConfig;
use std::sync::Arc;
use tracing::info;

/// Bind and serve until the process is stopped
pub async fn run(config: &ServerConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.listen_address, config.port);
    let router = create_router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API listening on {}", addr);
    axum::serve(listener, router).await
}
