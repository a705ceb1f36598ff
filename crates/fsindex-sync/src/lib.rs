//! fsindex Sync
//!
//! This crate provides the write side of the pipeline against an external
//! search engine:
//! - The [`BatchSyncClient`] contract (ensure-schema, bulk upsert,
//!   delete-where, wait-for-completion)
//! - Manticore (immediate acknowledgement) and Meilisearch (task polling)
//!   backends, plus an in-memory engine
//! - Bounded exponential-backoff retry and [`SyncWriter`], which turns one
//!   write and its acknowledgement into a single retryable unit

mod client;
mod error;
pub mod manticore;
pub mod meilisearch;
pub mod memory;
pub mod retry;
mod writer;

pub use client::{BatchSyncClient, TaskId, TaskOutcome, WriteAck};
pub use error::SyncError;
pub use manticore::{ManticoreClient, ManticoreOptions};
pub use meilisearch::{MeilisearchClient, MeilisearchOptions};
pub use memory::MemoryClient;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use writer::SyncWriter;
