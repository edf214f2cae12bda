//! Caller-facing job model and chain composition.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A unit of work submitted by a caller: which task runs it, with what
/// payload, under which options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Name of the registered task that handles this job. Resolved at
    /// worker time; an unknown name drops the message.
    pub task: String,

    /// Opaque payload handed to the handler as raw bytes.
    pub payload: Vec<u8>,

    #[serde(default)]
    pub opts: JobOpts,

    /// Successor enqueued after this job completes successfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<Box<Job>>,
}

/// Options governing a job's message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobOpts {
    /// Queue override. The task's queue is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,

    /// Number of times the job is re-enqueued after a handler error.
    /// Zero means no retry.
    #[serde(default)]
    pub max_retry: u32,

    /// Cron expression (six fields, leading seconds column). A scheduled
    /// job is registered with the scheduler instead of enqueued directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

/// Execution metadata propagated along a chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Artifacts saved by the previous job in the chain, in append order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prev_job_results: Vec<Vec<u8>>,
}

impl Job {
    pub fn new(task: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            task: task.into(),
            payload,
            opts: JobOpts::default(),
            on_success: None,
        }
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.opts.queue = Some(queue.into());
        self
    }

    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.opts.max_retry = max_retry;
        self
    }

    pub fn schedule(mut self, expr: impl Into<String>) -> Self {
        self.opts.schedule = Some(expr.into());
        self
    }

    pub fn on_success(mut self, job: Job) -> Self {
        self.on_success = Some(Box::new(job));
        self
    }
}

/// Fold `jobs` into a linked chain where each job's successor is the next.
///
/// Successors are owned values, so a cycle cannot be constructed. A member
/// that already carries a successor is rejected rather than silently
/// overwritten.
pub fn chain(jobs: Vec<Job>) -> Result<Job, Error> {
    if jobs.iter().any(|job| job.on_success.is_some()) {
        return Err(Error::AlreadyChained);
    }

    let mut rest = jobs.into_iter().rev();
    let Some(mut head) = rest.next() else {
        return Err(Error::EmptyChain);
    };
    for mut job in rest {
        job.on_success = Some(Box::new(head));
        head = job;
    }
    Ok(head)
}
