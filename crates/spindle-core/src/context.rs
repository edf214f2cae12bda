//! Per-execution context handed to task handlers.

use std::sync::Arc;

use uuid::Uuid;

use crate::codec;
use crate::domain::Meta;
use crate::error::Error;
use crate::results::{result_key, Results};

/// Context for one handler execution.
///
/// Owned by the worker running the job; carries the chain metadata and an
/// append-only artifact sink backed by the results store. Artifacts are
/// persisted on every `save`, so they are already durable by the time the
/// job is marked successful.
pub struct JobCtx {
    uuid: Uuid,
    meta: Meta,
    results: Vec<Vec<u8>>,
    store: Arc<dyn Results>,
}

impl JobCtx {
    pub(crate) fn new(uuid: Uuid, meta: Meta, store: Arc<dyn Results>) -> Self {
        Self {
            uuid,
            meta,
            results: Vec::new(),
            store,
        }
    }

    /// Uuid of the job being executed.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Metadata for this execution, including the previous job's artifacts
    /// when running as part of a chain.
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Append an artifact and persist the full list under the job's result
    /// key.
    pub async fn save(&mut self, artifact: Vec<u8>) -> Result<(), Error> {
        self.results.push(artifact);
        let encoded = codec::marshal(&self.results)?;
        self.store.set(&result_key(self.uuid), encoded).await
    }

    /// Artifacts saved so far, in append order.
    pub(crate) fn results(&self) -> &[Vec<u8>] {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::InMemoryResults;

    #[tokio::test]
    async fn save_persists_the_growing_artifact_list() {
        let store: Arc<dyn Results> = Arc::new(InMemoryResults::new());
        let uuid = Uuid::new_v4();
        let mut ctx = JobCtx::new(uuid, Meta::default(), Arc::clone(&store));

        ctx.save(b"first".to_vec()).await.unwrap();
        ctx.save(b"second".to_vec()).await.unwrap();

        let encoded = store.get(&result_key(uuid)).await.unwrap();
        let stored: Vec<Vec<u8>> = codec::unmarshal(&encoded).unwrap();
        assert_eq!(stored, vec![b"first".to_vec(), b"second".to_vec()]);
        assert_eq!(ctx.results(), stored.as_slice());
    }

    #[tokio::test]
    async fn meta_exposes_previous_results() {
        let store: Arc<dyn Results> = Arc::new(InMemoryResults::new());
        let meta = Meta {
            prev_job_results: vec![b"7".to_vec()],
        };
        let ctx = JobCtx::new(Uuid::new_v4(), meta, store);

        assert_eq!(ctx.meta().prev_job_results, vec![b"7".to_vec()]);
        assert!(ctx.results().is_empty());
    }
}
