//! spindle-core
//!
//! Core building blocks for the Spindle task-queue runtime.
//!
//! - domain: jobs, messages, statuses, chain composition
//! - broker: transport port + in-memory implementation
//! - results: persistence port + in-memory implementation
//! - registry: named task handlers with queue/concurrency/callback options
//! - server: façade wiring consumers, worker pools, and the cron scheduler

pub mod broker;
pub mod codec;
pub mod context;
pub mod domain;
pub mod error;
pub mod registry;
pub mod results;
mod scheduler;
pub mod server;

pub use broker::{Broker, InMemoryBroker};
pub use context::JobCtx;
pub use domain::{chain, Job, JobMessage, JobOpts, Meta, Status};
pub use error::{Error, JobError};
pub use registry::{Callback, Handler, Task, TaskCallbacks, TaskOpts};
pub use results::{InMemoryResults, Results};
pub use server::{Server, ServerBuilder};

/// Queue used when neither the job nor its task names one.
pub const DEFAULT_QUEUE: &str = "spindle:tasks";

/// Target under which the runtime emits its spans and events.
pub const INSTRUMENTATION_NAME: &str = "spindle";
