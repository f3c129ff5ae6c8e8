//! Highlight Record Store Library
//!
//! The [`RecordRepository`] trait and its backends: DynamoDB for deployed
//! environments and an in-memory map for local runs and tests.
//!
//! # Table layout
//!
//! One item per uploaded asset, keyed by `videoId`, with `userId`, `status`,
//! `uploadedSize`, `updatedAt` and `createdAt` attributes. A global secondary
//! index on `userId` serves the owner listing.

#[cfg(feature = "store-dynamodb")]
pub mod aws;
#[cfg(feature = "store-dynamodb")]
pub mod dynamo;
pub mod factory;
pub mod memory;
pub mod repository;

// Re-export commonly used types
#[cfg(feature = "store-dynamodb")]
pub use dynamo::DynamoRecordRepository;
pub use factory::create_record_repository;
pub use highlight_core::StoreError;
pub use memory::{Fault, InMemoryRecordRepository};
pub use repository::RecordRepository;
