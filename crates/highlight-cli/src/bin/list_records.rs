use anyhow::Result;
use clap::builder::NonEmptyStringValueParser;
use clap::Parser;

use highlight_cli::{connect, init_tracing, print_records, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "list-records")]
#[command(about = "List a user's upload records, newest first")]
struct Args {
    /// Owner whose records to list
    #[arg(long, value_name = "USER_ID", value_parser = NonEmptyStringValueParser::new())]
    owner_id: String,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let repository = connect().await?;
    let records = repository.query_by_owner(&args.owner_id).await?;

    print_records(&records, args.format)
}
