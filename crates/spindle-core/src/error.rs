//! Crate-level error types.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::Status;

/// Error type returned by task handlers.
///
/// Boxed so handlers can use `?` on their own error types. The runtime only
/// needs `Display` for `prev_err` and a downcast check for
/// [`Error::Cancelled`].
pub type JobError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// Construction-time validation failure.
    #[error("{0}")]
    InvalidOptions(String),

    #[error("handler not found for task \"{0}\"")]
    UnknownTask(String),

    #[error("chain needs at least one job")]
    EmptyChain,

    #[error("chain members must not already carry a successor")]
    AlreadyChained,

    #[error("encode job message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decode job message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Transport failure reported by a broker implementation.
    #[error("broker: {0}")]
    Broker(String),

    /// Transport failure reported by a results-store implementation.
    #[error("results store: {0}")]
    Results(String),

    #[error("no record under key \"{0}\"")]
    NotFound(String),

    /// Refused write: the job already reached a terminal status.
    #[error("job {uuid} is already {status}")]
    Terminal { uuid: Uuid, status: Status },

    #[error("scheduler: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    /// The runtime is shutting down. A handler returning this is treated as
    /// interrupted, not failed: no retry and no state transition.
    #[error("runtime is shutting down")]
    Cancelled,
}
