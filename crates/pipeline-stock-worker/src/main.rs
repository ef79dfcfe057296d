// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! STOCK-WORKER binary: thin bootstrap that wires config into a running
//! poll loop. All business logic lives in `pipeline_stock_worker::StockWorkerHandler`.

use std::sync::Arc;

use anyhow::Result;
use pipeline_core::config::Config;
use pipeline_core::messaging::{MessageBroker, RedisBroker, STOCK_QUEUE};
use pipeline_core::runner::WorkerLoop;
use pipeline_core::store::PostgresStore;
use pipeline_stock_worker::StockWorkerHandler;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

const BATCH_SIZE: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(
            "pipeline_stock_worker=info"
                .parse()
                .expect("static directive parses"),
        ))
        .init();

    info!("starting pipeline-stock-worker");

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new().connect(&config.database_url).await?;
    let store = Arc::new(PostgresStore::new(pool));

    let broker: Arc<dyn MessageBroker> = Arc::new(RedisBroker::connect(&config.redis_url).await?);
    info!("connected to store and broker");

    let handler = StockWorkerHandler::new(store);
    let worker = WorkerLoop::new(broker, STOCK_QUEUE, BATCH_SIZE, handler);
    let shutdown = worker.shutdown_handle();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        shutdown.notify_one();
    });

    worker.run().await;

    info!("shutdown complete");
    Ok(())
}
