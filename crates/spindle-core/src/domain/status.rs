//! Job status values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a job message.
///
/// The wire strings are part of the persisted format and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Recorded at initial enqueue, before the broker hand-off.
    Queued,
    /// A worker owns the message and is about to run the handler.
    Processing,
    /// The handler errored and the message was put back on its queue.
    Retrying,
    /// The handler completed and its artifacts are persisted.
    Successful,
    /// The handler errored with no retries left.
    Failed,
}

impl Status {
    /// Terminal statuses accept no further state writes.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Successful | Status::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Queued => "queued",
            Status::Processing => "processing",
            Status::Retrying => "retrying",
            Status::Successful => "successful",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_are_stable() {
        for (status, expected) in [
            (Status::Queued, "\"queued\""),
            (Status::Processing, "\"processing\""),
            (Status::Retrying, "\"retrying\""),
            (Status::Successful, "\"successful\""),
            (Status::Failed, "\"failed\""),
        ] {
            assert_eq!(serde_json::to_string(&status).unwrap(), expected);
        }
    }

    #[test]
    fn only_successful_and_failed_are_terminal() {
        assert!(Status::Successful.is_terminal());
        assert!(Status::Failed.is_terminal());
        assert!(!Status::Queued.is_terminal());
        assert!(!Status::Processing.is_terminal());
        assert!(!Status::Retrying.is_terminal());
    }
}
