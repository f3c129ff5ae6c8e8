//! DynamoDB record store.

use std::collections::HashMap;
use std::fmt::Debug;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use highlight_core::{Record, RecordStatus, StatusUpdate, StoreError};

use crate::repository::{require_owner_id, RecordRepository};

pub const KEY_ATTRIBUTE: &str = "videoId";
pub const OWNER_ATTRIBUTE: &str = "userId";
pub const STATUS_ATTRIBUTE: &str = "status";
pub const UPLOADED_SIZE_ATTRIBUTE: &str = "uploadedSize";
pub const UPDATED_AT_ATTRIBUTE: &str = "updatedAt";
pub const CREATED_AT_ATTRIBUTE: &str = "createdAt";

/// Service error codes worth another delivery. Everything else the service
/// returns is a problem with the request or the table itself.
const RETRIABLE_ERROR_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "InternalServerError",
    "ServiceUnavailable",
    "TransactionConflictException",
];

type Item = HashMap<String, AttributeValue>;

#[derive(Debug, Clone)]
pub struct DynamoRecordRepository {
    client: Client,
    table: String,
    owner_index: String,
    require_existing: bool,
}

impl DynamoRecordRepository {
    pub fn new(
        sdk_config: &SdkConfig,
        table: impl Into<String>,
        owner_index: impl Into<String>,
        require_existing: bool,
    ) -> Self {
        Self::new_from_client(Client::new(sdk_config), table, owner_index, require_existing)
    }

    pub fn new_from_client(
        client: Client,
        table: impl Into<String>,
        owner_index: impl Into<String>,
        require_existing: bool,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            owner_index: owner_index.into(),
            require_existing,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn query_owner_index(&self, owner_id: &str) -> Result<Vec<Record>, StoreError> {
        let mut records = Vec::new();
        let mut last_evaluated_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table)
                .index_name(&self.owner_index)
                .key_condition_expression("#owner = :owner")
                .expression_attribute_names("#owner", OWNER_ATTRIBUTE)
                .expression_attribute_values(":owner", AttributeValue::S(owner_id.to_string()))
                .scan_index_forward(false)
                .set_exclusive_start_key(last_evaluated_key)
                .send()
                .await
                .map_err(classify_sdk_error)?;

            collect_records(output.items.unwrap_or_default(), &mut records);

            last_evaluated_key = output.last_evaluated_key;
            if last_evaluated_key.is_none() {
                break;
            }
        }

        Ok(records)
    }

    async fn scan_by_owner(&self, owner_id: &str) -> Result<Vec<Record>, StoreError> {
        let mut records = Vec::new();
        let mut last_evaluated_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table)
                .filter_expression("#owner = :owner")
                .expression_attribute_names("#owner", OWNER_ATTRIBUTE)
                .expression_attribute_values(":owner", AttributeValue::S(owner_id.to_string()))
                .set_exclusive_start_key(last_evaluated_key)
                .send()
                .await
                .map_err(classify_sdk_error)?;

            collect_records(output.items.unwrap_or_default(), &mut records);

            last_evaluated_key = output.last_evaluated_key;
            if last_evaluated_key.is_none() {
                break;
            }
        }

        // Scan order is arbitrary; match the index's newest-first order
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[async_trait]
impl RecordRepository for DynamoRecordRepository {
    #[tracing::instrument(skip(self, update), fields(record_id = %update.record_id, table = %self.table))]
    async fn update_status(&self, update: &StatusUpdate) -> Result<Record, StoreError> {
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table)
            .key(KEY_ATTRIBUTE, AttributeValue::S(update.record_id.clone()))
            .update_expression("SET #status = :status, #size = :size, #updated = :updated")
            .expression_attribute_names("#status", STATUS_ATTRIBUTE)
            .expression_attribute_names("#size", UPLOADED_SIZE_ATTRIBUTE)
            .expression_attribute_names("#updated", UPDATED_AT_ATTRIBUTE)
            .expression_attribute_values(":status", AttributeValue::S(update.status.to_string()))
            .expression_attribute_values(
                ":size",
                AttributeValue::N(update.uploaded_size.to_string()),
            )
            .expression_attribute_values(
                ":updated",
                AttributeValue::N(update.updated_at.to_string()),
            )
            .return_values(ReturnValue::AllNew);

        if self.require_existing {
            request = request
                .condition_expression("attribute_exists(#key)")
                .expression_attribute_names("#key", KEY_ATTRIBUTE);
        }

        let output = request.send().await.map_err(|err| {
            let missing = err
                .as_service_error()
                .map(|e| e.is_conditional_check_failed_exception())
                .unwrap_or(false);
            if missing {
                StoreError::NotFound(update.record_id.clone())
            } else {
                classify_sdk_error(err)
            }
        })?;

        let attributes = output
            .attributes
            .ok_or_else(|| StoreError::permanent(anyhow!("UpdateItem returned no attributes")))?;

        record_from_item(&attributes).map_err(StoreError::Permanent)
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, record_id: &str) -> Result<Option<Record>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(KEY_ATTRIBUTE, AttributeValue::S(record_id.to_string()))
            .send()
            .await
            .map_err(classify_sdk_error)?;

        output
            .item
            .map(|item| record_from_item(&item).map_err(StoreError::Permanent))
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<Record>, StoreError> {
        // Checked here so the index failure it would cause never triggers a scan.
        require_owner_id(owner_id)?;

        match self.query_owner_index(owner_id).await {
            Ok(records) => Ok(records),
            Err(StoreError::Permanent(e)) => {
                tracing::warn!(
                    error = %e,
                    index = %self.owner_index,
                    "Owner index query failed, falling back to table scan"
                );
                self.scan_by_owner(owner_id).await
            }
            Err(e) => Err(e),
        }
    }
}

fn collect_records(items: Vec<Item>, records: &mut Vec<Record>) {
    for item in items {
        match record_from_item(&item) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable record item"),
        }
    }
}

/// Whether a service error code names a transient condition.
pub(crate) fn is_retriable_error_code(code: Option<&str>) -> bool {
    code.map(|c| RETRIABLE_ERROR_CODES.contains(&c))
        .unwrap_or(false)
}

/// Sort an SDK failure into retriable or permanent.
///
/// Requests that never got a service answer (timeouts, dispatch and response
/// failures) are retriable; requests the SDK could not even build are not.
fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let retriable = match &err {
        SdkError::ConstructionFailure(_) => false,
        SdkError::ServiceError(service) => is_retriable_error_code(service.err().code()),
        _ => true,
    };

    if retriable {
        StoreError::retriable(err)
    } else {
        StoreError::permanent(err)
    }
}

pub(crate) fn record_from_item(item: &Item) -> anyhow::Result<Record> {
    let record_id = string_attr(item, KEY_ATTRIBUTE)
        .with_context(|| format!("item has no string {} attribute", KEY_ATTRIBUTE))?;
    let status = string_attr(item, STATUS_ATTRIBUTE)
        .context("item has no string status attribute")?
        .parse::<RecordStatus>()?;

    Ok(Record {
        record_id,
        owner_id: string_attr(item, OWNER_ATTRIBUTE),
        status,
        uploaded_size: number_attr(item, UPLOADED_SIZE_ATTRIBUTE)?,
        updated_at: number_attr(item, UPDATED_AT_ATTRIBUTE)?,
        created_at: number_attr(item, CREATED_AT_ATTRIBUTE)?,
    })
}

fn string_attr(item: &Item, name: &str) -> Option<String> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Some(value.clone()),
        _ => None,
    }
}

fn number_attr<T>(item: &Item, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match item.get(name) {
        Some(AttributeValue::N(value)) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("attribute {} is not a valid number: {}", name, value)),
        _ => Ok(None),
    }
}
