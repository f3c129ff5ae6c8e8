use std::sync::Arc;

use anyhow::Context;
use aws_lambda_events::sqs::SqsEvent;
use highlight_core::WorkerConfig;
use highlight_db::aws::load_sdk_config;
use highlight_worker::handler::handler;
use highlight_worker::setup::build_processor;
use highlight_worker::telemetry::init_telemetry;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = WorkerConfig::from_env().context("failed to load configuration")?;
    config.validate()?;
    init_telemetry(&config)?;

    let sdk_config = load_sdk_config(&config).await;
    let processor = Arc::new(build_processor(&config, &sdk_config)?);

    tracing::info!(environment = %config.environment, "Upload-complete handler ready");

    let func = service_fn(move |event: LambdaEvent<SqsEvent>| {
        let processor = processor.clone();

        async move { handler(&processor, event).await }
    });

    run(func).await
}
