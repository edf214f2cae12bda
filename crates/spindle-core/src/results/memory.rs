//! In-memory results store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::Results;
use crate::error::Error;

/// Results store backed by process memory, for tests and single-process
/// deployments. Records do not survive the process.
#[derive(Default)]
pub struct InMemoryResults {
    records: Mutex<HashMap<String, Vec<u8>>>,
    success: Mutex<Vec<Uuid>>,
    failed: Mutex<Vec<Uuid>>,
}

impl InMemoryResults {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Results for InMemoryResults {
    async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        let records = self.records.lock().await;
        records
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        let mut records = self.records.lock().await;
        records.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_success(&self, uuid: Uuid) -> Result<(), Error> {
        self.success.lock().await.push(uuid);
        Ok(())
    }

    async fn set_failed(&self, uuid: Uuid) -> Result<(), Error> {
        self.failed.lock().await.push(uuid);
        Ok(())
    }

    async fn get_success(&self) -> Result<Vec<Uuid>, Error> {
        Ok(self.success.lock().await.clone())
    }

    async fn get_failed(&self) -> Result<Vec<Uuid>, Error> {
        Ok(self.failed.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{message_key, result_key};

    #[tokio::test]
    async fn set_then_get_returns_the_record() {
        let store = InMemoryResults::new();
        store.set("msg:abc", b"record".to_vec()).await.unwrap();
        assert_eq!(store.get("msg:abc").await.unwrap(), b"record".to_vec());
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = InMemoryResults::new();
        let err = store.get("msg:missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn indexes_record_uuids_in_order() {
        let store = InMemoryResults::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.set_success(a).await.unwrap();
        store.set_success(b).await.unwrap();
        store.set_failed(a).await.unwrap();

        assert_eq!(store.get_success().await.unwrap(), vec![a, b]);
        assert_eq!(store.get_failed().await.unwrap(), vec![a]);
    }

    #[test]
    fn key_helpers_use_stable_prefixes() {
        let uuid = Uuid::nil();
        assert_eq!(
            message_key(uuid),
            "msg:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            result_key(uuid),
            "result:00000000-0000-0000-0000-000000000000"
        );
    }
}
