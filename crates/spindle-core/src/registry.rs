//! Task registry: named handlers with queue, concurrency, and callbacks.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::context::JobCtx;
use crate::error::{Error, JobError};

/// User-supplied function executing a job's payload.
///
/// The payload is opaque bytes; decoding it is the handler's business.
/// Artifacts saved through the context survive the execution and are
/// returned by `Server::get_result`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, payload: &[u8], ctx: &mut JobCtx) -> Result<(), JobError>;
}

/// Hook invoked on a job state transition. Runs on the worker; a panicking
/// callback is caught and logged instead of taking the worker down.
pub type Callback = Box<dyn Fn(&JobCtx) + Send + Sync>;

/// Optional per-transition hooks for a task.
#[derive(Default)]
pub struct TaskCallbacks {
    pub on_processing: Option<Callback>,
    pub on_success: Option<Callback>,
    pub on_retry: Option<Callback>,
    pub on_failed: Option<Callback>,
}

/// Options accepted at registration time. Normalized by the server:
/// `concurrency == 0` becomes 1, an empty queue becomes the default queue.
pub struct TaskOpts {
    /// Worker slots for this task's queue.
    pub concurrency: usize,
    /// Queue the task consumes from.
    pub queue: String,
    pub callbacks: TaskCallbacks,
}

impl Default for TaskOpts {
    fn default() -> Self {
        Self {
            concurrency: 1,
            queue: String::new(),
            callbacks: TaskCallbacks::default(),
        }
    }
}

/// A registered task descriptor. Immutable after registration.
pub struct Task {
    pub(crate) name: String,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) opts: TaskOpts,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Concurrent name-to-task mapping.
///
/// Registrations happen before the server starts consuming; after that
/// workers only read, one lookup per job. A readers/writer lock fits that
/// traffic, and it is never held across an await point.
#[derive(Default)]
pub(crate) struct Registry {
    tasks: RwLock<HashMap<String, Arc<Task>>>,
}

impl Registry {
    /// Insert `task` under its name, replacing any prior entry.
    pub(crate) fn register(&self, task: Task) {
        let mut tasks = self
            .tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.insert(task.name.clone(), Arc::new(task));
    }

    pub(crate) fn get(&self, name: &str) -> Result<Arc<Task>, Error> {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        tasks
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTask(name.to_string()))
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Task>> {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        tasks.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    #[async_trait]
    impl Handler for NoopHandler {
        async fn handle(&self, _payload: &[u8], _ctx: &mut JobCtx) -> Result<(), JobError> {
            Ok(())
        }
    }

    fn task(name: &str, queue: &str) -> Task {
        Task {
            name: name.to_string(),
            handler: Arc::new(NoopHandler),
            opts: TaskOpts {
                queue: queue.to_string(),
                ..TaskOpts::default()
            },
        }
    }

    #[test]
    fn lookup_returns_registered_task() {
        let registry = Registry::default();
        registry.register(task("send_email", "emails"));

        let found = registry.get("send_email").unwrap();
        assert_eq!(found.name, "send_email");
        assert_eq!(found.opts.queue, "emails");
    }

    #[test]
    fn lookup_of_unknown_name_errors() {
        let registry = Registry::default();
        let err = registry.get("ghost").unwrap_err();
        assert!(matches!(err, Error::UnknownTask(name) if name == "ghost"));
    }

    #[test]
    fn re_registration_replaces_the_entry() {
        let registry = Registry::default();
        registry.register(task("job", "first"));
        registry.register(task("job", "second"));

        assert_eq!(registry.get("job").unwrap().opts.queue, "second");
        assert_eq!(registry.snapshot().len(), 1);
    }
}
