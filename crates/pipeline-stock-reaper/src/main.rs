// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! STOCK-REAPER binary: thin bootstrap around `pipeline_stock_reaper::Reaper`.
//! Unlike the queue-consuming workers, this process is a poll loop with no
//! broker dependency.

use std::sync::Arc;

use anyhow::Result;
use pipeline_core::config::ReaperConfig;
use pipeline_core::store::PostgresStore;
use pipeline_stock_reaper::Reaper;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(
            "pipeline_stock_reaper=info"
                .parse()
                .expect("static directive parses"),
        ))
        .init();

    info!("starting pipeline-stock-reaper");

    let config = ReaperConfig::from_env()?;

    let pool = PgPoolOptions::new().connect(&config.shared.database_url).await?;
    let store = Arc::new(PostgresStore::new(pool));
    info!("connected to store");

    let reaper = Reaper::new(store, config.grace_period, config.poll_interval);
    let shutdown = reaper.shutdown_handle();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        shutdown.notify_one();
    });

    reaper.run().await;

    info!("shutdown complete");
    Ok(())
}
