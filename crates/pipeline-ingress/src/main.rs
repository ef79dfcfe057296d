// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ingress binary: thin bootstrap that wires config into a running HTTP
//! server. All request handling lives in `pipeline_ingress::handlers`.

use std::sync::Arc;

use anyhow::Result;
use pipeline_core::config::IngressConfig;
use pipeline_core::messaging::{MessageBroker, RedisBroker};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(
            "pipeline_ingress=info"
                .parse()
                .expect("static directive parses"),
        ))
        .init();

    info!("starting pipeline-ingress");

    let config = IngressConfig::from_env()?;

    let broker: Arc<dyn MessageBroker> = Arc::new(RedisBroker::connect(&config.shared.redis_url).await?);
    info!("connected to message broker");

    let app = pipeline_ingress::build_router(broker);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
