use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use highlight_core::WorkerConfig;
use highlight_db::aws::load_sdk_config;
use highlight_worker::queue::SqsMessageSource;
use highlight_worker::setup::build_processor;
use highlight_worker::telemetry::init_telemetry;
use highlight_worker::{PollerConfig, QueuePoller};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env().context("failed to load configuration")?;
    config.validate_poller()?;
    init_telemetry(&config)?;

    let sdk_config = load_sdk_config(&config).await;
    let processor = Arc::new(build_processor(&config, &sdk_config)?);
    let source = Arc::new(SqsMessageSource::from_config(&config, &sdk_config)?);

    let poller = QueuePoller::new(
        source,
        processor,
        PollerConfig {
            visibility_timeout: Duration::from_secs(
                u64::try_from(config.poller_visibility_timeout_secs).unwrap_or_default(),
            ),
            ..PollerConfig::default()
        },
    );

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received, finishing current batch");
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                // Dropping the sender would stop the poller.
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    });

    poller.run(shutdown_rx).await;
    Ok(())
}
