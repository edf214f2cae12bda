//! Results port: persistence for job state, artifacts, and outcome indexes.

mod memory;

pub use memory::InMemoryResults;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Error;

/// Key prefix for persisted job-message records. Part of the stable
/// storage layout; changing it orphans existing records.
pub const MESSAGE_PREFIX: &str = "msg:";

/// Key prefix for handler-saved artifact lists.
pub const RESULT_PREFIX: &str = "result:";

pub fn message_key(uuid: Uuid) -> String {
    format!("{MESSAGE_PREFIX}{uuid}")
}

pub fn result_key(uuid: Uuid) -> String {
    format!("{RESULT_PREFIX}{uuid}")
}

/// Record store for job-message state, artifacts, and the success/failed
/// index sets. Implementations must be concurrency-safe.
#[async_trait]
pub trait Results: Send + Sync {
    /// Fetch the record under `key`. Missing keys surface as
    /// [`Error::NotFound`].
    async fn get(&self, key: &str) -> Result<Vec<u8>, Error>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), Error>;

    /// Add `uuid` to the success index.
    async fn set_success(&self, uuid: Uuid) -> Result<(), Error>;

    /// Add `uuid` to the failed index.
    async fn set_failed(&self, uuid: Uuid) -> Result<(), Error>;

    async fn get_success(&self) -> Result<Vec<Uuid>, Error>;

    async fn get_failed(&self) -> Result<Vec<Uuid>, Error>;
}
