//! Cron scheduler: periodically enqueues a stored job template.

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use uuid::Uuid;

use crate::domain::Job;
use crate::error::Error;
use crate::server::Server;

/// Thin wrapper around the cron runtime.
///
/// Each registration owns a job template; every firing goes through the
/// normal enqueue path and produces an independent message with its own
/// uuid.
#[derive(Clone)]
pub(crate) struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    pub(crate) async fn new() -> Result<Self, Error> {
        Ok(Self {
            inner: JobScheduler::new().await?,
        })
    }

    /// Register `template` to fire on `expr` (six-field cron, leading
    /// seconds column). Returns the registration id.
    ///
    /// Boxed explicitly (rather than `async fn`) because this call and
    /// [`Server::enqueue_with_meta`] are mutually recursive through the
    /// cron callback below; an opaque `impl Future` return here defeats
    /// rustc's auto-trait (`Send`) inference on that cycle.
    pub(crate) fn add(
        &self,
        expr: &str,
        server: Server,
        template: Job,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Uuid, Error>> + Send + '_>> {
        let expr = expr.to_string();
        Box::pin(async move {
            let cron_job = CronJob::new_async(&expr, move |_id, _scheduler| {
                let server = server.clone();
                let job = template.clone();
                Box::pin(async move {
                    if let Err(error) = server.enqueue(job).await {
                        tracing::error!(%error, "scheduled enqueue failed");
                    }
                })
            })?;

            let mut inner = self.inner.clone();
            Ok(inner.add(cron_job).await?)
        })
    }

    pub(crate) async fn start(&self) -> Result<(), Error> {
        let mut inner = self.inner.clone();
        inner.start().await?;
        Ok(())
    }

    pub(crate) async fn shutdown(&self) {
        let mut inner = self.inner.clone();
        if let Err(error) = inner.shutdown().await {
            tracing::error!(%error, "scheduler shutdown failed");
        }
    }
}
