// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Key-value store holding registry entries.
//!
//! Keys are `/`-separated paths, values are JSON documents. Each call is a
//! single atomic operation on one key; the registry issues exactly one
//! mutating call per change and never retries. Changes that depend on the
//! current value go through [`RegistryStore::update`].

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored document does not have the expected shape.
    #[error("corrupt entry at {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An update closure declined to produce a new value.
    #[error("update of {0} aborted")]
    Aborted(String),
}

/// Computes the new value of an entry from its current one.
pub type Mutation<'a> =
    Box<dyn FnOnce(Option<Value>) -> Result<Value, StoreError> + Send + 'a>;

/// Backing store for the registry.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Read one entry.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Create or replace one entry.
    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Replace one entry with `apply(current)`, serialized against every
    /// other `update` of the same key. Nothing is written when `apply` fails.
    async fn update(&self, key: &str, apply: Mutation<'_>) -> Result<Value, StoreError>;

    /// Remove one entry, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
