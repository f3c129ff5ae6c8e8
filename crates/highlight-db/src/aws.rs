//! Shared AWS SDK configuration for every client a process builds.

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_dynamodb::config::Region;
use highlight_core::WorkerConfig;

/// Load the SDK configuration once per process.
///
/// Region and endpoint overrides come from the worker configuration; anything
/// unset falls through to the default provider chain.
pub async fn load_sdk_config(config: &WorkerConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &config.aws_region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint) = &config.aws_endpoint_url {
        tracing::info!(endpoint = %endpoint, "Using custom AWS endpoint");
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}
