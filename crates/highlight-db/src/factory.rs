use std::sync::Arc;

#[cfg(feature = "store-dynamodb")]
use crate::DynamoRecordRepository;
use crate::{InMemoryRecordRepository, RecordRepository};
use highlight_core::{RecordStoreBackend, WorkerConfig};

/// Create a record store based on configuration
///
/// `sdk_config` is the process-wide AWS configuration; it is only read by the
/// DynamoDB backend.
#[cfg(feature = "store-dynamodb")]
pub fn create_record_repository(
    config: &WorkerConfig,
    sdk_config: &aws_config::SdkConfig,
) -> anyhow::Result<Arc<dyn RecordRepository>> {
    match config.record_store {
        RecordStoreBackend::DynamoDb => {
            let table = config
                .records_table
                .clone()
                .ok_or_else(|| anyhow::anyhow!("RECORDS_TABLE not configured"))?;
            tracing::info!(
                table = %table,
                owner_index = %config.owner_index_name,
                require_existing = config.require_existing_record,
                "Using DynamoDB record store"
            );
            Ok(Arc::new(DynamoRecordRepository::new(
                sdk_config,
                table,
                config.owner_index_name.clone(),
                config.require_existing_record,
            )))
        }
        RecordStoreBackend::Memory => Ok(memory_repository(config)),
    }
}

#[cfg(not(feature = "store-dynamodb"))]
pub fn create_record_repository(
    config: &WorkerConfig,
) -> anyhow::Result<Arc<dyn RecordRepository>> {
    match config.record_store {
        RecordStoreBackend::DynamoDb => Err(anyhow::anyhow!(
            "DynamoDB record store not available (store-dynamodb feature not enabled)"
        )),
        RecordStoreBackend::Memory => Ok(memory_repository(config)),
    }
}

fn memory_repository(config: &WorkerConfig) -> Arc<dyn RecordRepository> {
    tracing::warn!("Using in-memory record store; updates are lost on exit");
    Arc::new(InMemoryRecordRepository::new(
        config.require_existing_record,
    ))
}
