//! Configuration module
//!
//! Worker, poller and CLI settings, read from the environment (and a `.env`
//! file when present).

use std::env;

const OWNER_INDEX_NAME: &str = "UserIdIndex";
const POLLER_MAX_MESSAGES: i32 = 10;
const POLLER_WAIT_TIME_SECS: i32 = 20;
const POLLER_VISIBILITY_TIMEOUT_SECS: i32 = 60;
const DEADLINE_MARGIN_MS: u64 = 500;

/// Where records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStoreBackend {
    DynamoDb,
    /// Process-local map, for local runs and tests.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub environment: String,
    pub log_format: LogFormat,
    pub record_store: RecordStoreBackend,
    pub records_table: Option<String>,
    pub owner_index_name: String,
    /// When true, updates are guarded with `attribute_exists` so a missing
    /// record is reported instead of created.
    pub require_existing_record: bool,
    pub aws_region: Option<String>,
    /// Custom endpoint for DynamoDB/SQS compatible services (LocalStack etc.)
    pub aws_endpoint_url: Option<String>,
    // Poller configuration
    pub queue_url: Option<String>,
    pub poller_max_messages: i32,
    pub poller_wait_time_secs: i32,
    pub poller_visibility_timeout_secs: i32,
    /// Time reserved before the invocation deadline to report unfinished items.
    pub deadline_margin_ms: u64,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. `from_env` is this over `std::env`.
    pub fn from_vars<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let record_store = match var("RECORD_STORE")
            .unwrap_or_else(|| "dynamodb".to_string())
            .to_lowercase()
            .as_str()
        {
            "dynamodb" | "dynamo" => RecordStoreBackend::DynamoDb,
            "memory" => RecordStoreBackend::Memory,
            other => return Err(anyhow::anyhow!("Invalid RECORD_STORE: {}", other)),
        };

        let log_format = match var("LOG_FORMAT")
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("json") => LogFormat::Json,
            Some("text") => LogFormat::Text,
            Some(other) => return Err(anyhow::anyhow!("Invalid LOG_FORMAT: {}", other)),
            // Lambda sets AWS_LAMBDA_FUNCTION_NAME; CloudWatch wants one JSON object per line
            None if var("AWS_LAMBDA_FUNCTION_NAME").is_some() => LogFormat::Json,
            None => LogFormat::Text,
        };

        let config = WorkerConfig {
            environment: var("ENVIRONMENT")
                .or_else(|| var("APP_ENV"))
                .unwrap_or_else(|| "development".to_string()),
            log_format,
            record_store,
            records_table: var("RECORDS_TABLE").or_else(|| var("VIDEOS_TABLE")),
            owner_index_name: var("OWNER_INDEX_NAME")
                .unwrap_or_else(|| OWNER_INDEX_NAME.to_string()),
            require_existing_record: parse_flag_or(&var, "REQUIRE_EXISTING_RECORD", false)?,
            aws_region: var("AWS_REGION").or_else(|| var("AWS_DEFAULT_REGION")),
            aws_endpoint_url: var("AWS_ENDPOINT_URL"),
            queue_url: var("QUEUE_URL"),
            poller_max_messages: parse_or(&var, "POLLER_MAX_MESSAGES", POLLER_MAX_MESSAGES)?,
            poller_wait_time_secs: parse_or(&var, "POLLER_WAIT_TIME_SECS", POLLER_WAIT_TIME_SECS)?,
            poller_visibility_timeout_secs: parse_or(
                &var,
                "POLLER_VISIBILITY_TIMEOUT_SECS",
                POLLER_VISIBILITY_TIMEOUT_SECS,
            )?,
            deadline_margin_ms: parse_or(&var, "DEADLINE_MARGIN_MS", DEADLINE_MARGIN_MS)?,
        };

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.record_store == RecordStoreBackend::DynamoDb && self.records_table.is_none() {
            return Err(anyhow::anyhow!(
                "RECORDS_TABLE (or VIDEOS_TABLE) must be set when using the DynamoDB record store"
            ));
        }

        if self.record_store == RecordStoreBackend::Memory && self.is_production() {
            return Err(anyhow::anyhow!(
                "RECORD_STORE=memory is not allowed in production"
            ));
        }

        if !(1..=10).contains(&self.poller_max_messages) {
            return Err(anyhow::anyhow!(
                "POLLER_MAX_MESSAGES must be between 1 and 10"
            ));
        }

        if !(0..=20).contains(&self.poller_wait_time_secs) {
            return Err(anyhow::anyhow!(
                "POLLER_WAIT_TIME_SECS must be between 0 and 20"
            ));
        }

        if self.poller_visibility_timeout_secs <= self.poller_wait_time_secs {
            return Err(anyhow::anyhow!(
                "POLLER_VISIBILITY_TIMEOUT_SECS must be greater than POLLER_WAIT_TIME_SECS"
            ));
        }

        Ok(())
    }

    /// Poller requires a queue on top of the worker settings.
    pub fn validate_poller(&self) -> Result<(), anyhow::Error> {
        self.validate()?;
        if self.queue_url.is_none() {
            return Err(anyhow::anyhow!("QUEUE_URL must be set to run the poller"));
        }
        Ok(())
    }
}

fn parse_flag_or<F>(var: &F, name: &str, default: bool) -> Result<bool, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name).map(|raw| raw.trim().to_lowercase()).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow::anyhow!("Invalid {}: {}", name, other)),
    }
}

fn parse_or<F, T>(var: &F, name: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {} ({})", name, raw, e)),
        None => Ok(default),
    }
}
