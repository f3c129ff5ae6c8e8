use std::sync::Arc;

use anyhow::Context;
use highlight_core::{Record, WorkerConfig};
use highlight_db::aws::load_sdk_config;
use highlight_db::{create_record_repository, RecordRepository};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Initialize tracing for CLI binaries. Logs go to stderr so JSON output
/// on stdout stays machine-readable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Open the record store the worker is configured against.
pub async fn connect() -> anyhow::Result<Arc<dyn RecordRepository>> {
    let config = WorkerConfig::from_env().context("failed to load configuration")?;
    config.validate()?;
    let sdk_config = load_sdk_config(&config).await;
    create_record_repository(&config, &sdk_config)
}

pub fn print_records(records: &[Record], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Table => print_records_table(records),
    }
    Ok(())
}

pub fn print_records_table(records: &[Record]) {
    if records.is_empty() {
        println!("No records found.");
        return;
    }

    println!(
        "{:<36} {:<24} {:<10} {:>12} {:>20} {:>20}",
        "Record ID", "Owner", "Status", "Size (MB)", "Created At", "Updated At"
    );
    println!("{}", "-".repeat(127));

    for record in records {
        println!(
            "{:<36} {:<24} {:<10} {:>12} {:>20} {:>20}",
            truncate_string(&record.record_id, 36),
            truncate_string(record.owner_id.as_deref().unwrap_or("-"), 24),
            record.status,
            format_size_mb(record.uploaded_size),
            format_timestamp(record.created_at),
            format_timestamp(record.updated_at),
        );
    }

    println!("\n{} record(s)", records.len());
}

/// Truncate to `max_len` characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

pub fn format_timestamp(epoch_seconds: Option<i64>) -> String {
    epoch_seconds
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_size_mb(bytes: Option<u64>) -> String {
    bytes
        .map(|b| format!("{:.2}", b as f64 / (1024.0 * 1024.0)))
        .unwrap_or_else(|| "-".to_string())
}
