//! Process-wide wiring shared by both binaries.

use std::sync::Arc;
use std::time::Duration;

use highlight_core::{SystemClock, WorkerConfig};
use highlight_db::create_record_repository;

use crate::batch::BatchProcessor;
use crate::updater::StatusUpdater;

/// Build the store client and processor once; every invocation reuses them.
pub fn build_processor(
    config: &WorkerConfig,
    sdk_config: &aws_config::SdkConfig,
) -> anyhow::Result<BatchProcessor> {
    let repository = create_record_repository(config, sdk_config)?;
    let updater = StatusUpdater::new(repository, Arc::new(SystemClock));
    Ok(BatchProcessor::new(
        updater,
        Duration::from_millis(config.deadline_margin_ms),
    ))
}
