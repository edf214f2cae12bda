//! Broker port: transport for encoded job messages.

mod memory;

pub use memory::InMemoryBroker;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::error::Error;

/// Message transport delivering job bytes from named queues.
///
/// Implementations are shared across consumers and workers and must be
/// concurrency-safe. Acknowledgement policy (at-least-once vs at-most-once)
/// is the implementation's choice and should be documented on the type; the
/// runtime tolerates duplicate delivery.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Durable hand-off of one encoded message to the named queue.
    async fn enqueue(&self, queue: &str, payload: Vec<u8>) -> Result<(), Error>;

    /// Deliver raw messages from `queue` into `out` until `shutdown` flips
    /// or the receiving side goes away.
    ///
    /// This call blocks for the lifetime of the consumer and must return
    /// promptly once `shutdown` is signalled.
    async fn consume(
        &self,
        queue: &str,
        out: mpsc::Sender<Vec<u8>>,
        shutdown: watch::Receiver<bool>,
    );
}
