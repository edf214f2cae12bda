//! The on-the-wire, persisted form of an in-flight job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::{Job, Meta};
use super::status::Status;

/// Wire and persistence form of a job. Encoded as a MessagePack named map;
/// unknown fields are ignored on decode, so fields can be added without
/// breaking older readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    /// Assigned exactly once, at initial enqueue.
    pub uuid: Uuid,

    pub job: Job,

    pub status: Status,

    /// Resolved queue name the message travels on.
    pub queue: String,

    pub max_retry: u32,

    /// Re-enqueue count so far. Never exceeds `max_retry`.
    pub retried: u32,

    /// Last handler error, empty when none.
    #[serde(default)]
    pub prev_err: String,

    /// Timestamp of the last state write.
    pub processed_at: DateTime<Utc>,

    /// Uuid of the enqueued successor, set before the parent is marked
    /// successful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success_uuid: Option<Uuid>,

    #[serde(default)]
    pub meta: Meta,
}

impl JobMessage {
    /// Materialize a fresh queued message from a job.
    pub(crate) fn new(job: Job, queue: String, meta: Meta) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            status: Status::Queued,
            max_retry: job.opts.max_retry,
            retried: 0,
            prev_err: String::new(),
            processed_at: Utc::now(),
            on_success_uuid: None,
            job,
            queue,
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_starts_queued_with_fresh_uuid() {
        let job = Job::new("test", vec![1, 2, 3]).max_retry(5);
        let a = JobMessage::new(job.clone(), "q".to_string(), Meta::default());
        let b = JobMessage::new(job, "q".to_string(), Meta::default());

        assert_eq!(a.status, Status::Queued);
        assert_eq!(a.max_retry, 5);
        assert_eq!(a.retried, 0);
        assert!(a.prev_err.is_empty());
        assert!(a.on_success_uuid.is_none());
        assert_ne!(a.uuid, b.uuid);
    }
}
