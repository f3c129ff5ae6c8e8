use highlight_core::{LogFormat, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,aws_config=warn,aws_smithy_runtime=warn,hyper=warn";

/// Initialize tracing. `RUST_LOG` overrides the default filter.
///
/// JSON output has no ANSI colors and flattened fields so CloudWatch Logs
/// Insights can query them directly.
pub fn init_telemetry(config: &WorkerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (json, text) = match config.log_format {
        LogFormat::Json => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_ansi(false),
            ),
            None,
        ),
        LogFormat::Text => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()?;

    tracing::debug!(
        environment = %config.environment,
        format = ?config.log_format,
        "Tracing initialized"
    );
    Ok(())
}
