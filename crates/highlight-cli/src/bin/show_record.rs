use anyhow::Result;
use clap::builder::NonEmptyStringValueParser;
use clap::Parser;

use highlight_cli::{connect, init_tracing, print_records, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "show-record")]
#[command(about = "Show the current state of one upload record")]
struct Args {
    #[arg(long, value_name = "RECORD_ID", value_parser = NonEmptyStringValueParser::new())]
    record_id: String,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let repository = connect().await?;
    let record = repository
        .get(&args.record_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("record {} not found", args.record_id))?;

    print_records(std::slice::from_ref(&record), args.format)
}
