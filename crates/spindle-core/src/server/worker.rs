//! Worker loop: decode queued messages, run handlers, finalize status.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::Instrument;

use super::Server;
use crate::codec;
use crate::context::JobCtx;
use crate::domain::{JobMessage, Meta};
use crate::error::Error;
use crate::registry::{Callback, Task};
use crate::INSTRUMENTATION_NAME;

/// One worker slot in a task's pool.
///
/// Workers share their task's input channel; each message is owned by
/// exactly one worker for the duration of its execution.
pub(crate) struct Worker {
    id: usize,
    server: Server,
    input: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        server: Server,
        input: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
    ) -> Self {
        Self { id, server, input }
    }

    pub(crate) async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(worker_id = self.id, "starting processor");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = {
                let mut input = self.input.lock().await;
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                    received = input.recv() => received,
                }
            };

            let Some(bytes) = received else {
                // Consumer side closed the channel.
                break;
            };

            self.process(bytes).await;
        }
        tracing::info!(worker_id = self.id, "shutting down processor");
    }

    async fn process(&self, bytes: Vec<u8>) {
        let span =
            tracing::info_span!(target: INSTRUMENTATION_NAME, "process", worker_id = self.id);
        self.process_message(bytes).instrument(span).await
    }

    async fn process_message(&self, bytes: Vec<u8>) {
        let mut msg: JobMessage = match codec::unmarshal(&bytes) {
            Ok(msg) => msg,
            Err(error) => {
                tracing::error!(%error, "dropping message that failed to decode");
                return;
            }
        };

        let task = match self.server.registry.get(&msg.job.task) {
            Ok(task) => task,
            Err(error) => {
                tracing::error!(%error, uuid = %msg.uuid, "dropping job with no registered handler");
                return;
            }
        };

        if let Err(error) = self.server.mark_processing(&mut msg).await {
            match error {
                Error::Terminal { .. } => {
                    tracing::debug!(uuid = %msg.uuid, "dropping duplicate delivery of a finished job");
                }
                error => {
                    tracing::error!(%error, uuid = %msg.uuid, "error setting the status to processing");
                }
            }
            return;
        }

        self.exec_job(msg, task).await;
    }

    async fn exec_job(&self, mut msg: JobMessage, task: Arc<Task>) {
        let span = tracing::info_span!(
            target: INSTRUMENTATION_NAME,
            "exec_job",
            uuid = %msg.uuid,
            task = %msg.job.task,
        );
        async {
            let mut ctx =
                JobCtx::new(msg.uuid, msg.meta.clone(), Arc::clone(&self.server.results));
            run_callback("on_processing", &task.opts.callbacks.on_processing, &ctx);

            match task.handler.handle(&msg.job.payload, &mut ctx).await {
                Ok(()) => self.finish_job(&mut msg, &task, &ctx).await,
                Err(error) => {
                    if matches!(error.downcast_ref::<Error>(), Some(Error::Cancelled)) {
                        // Shutdown, not failure: leave the message alone so
                        // the broker's re-delivery policy decides its fate.
                        tracing::info!(uuid = %msg.uuid, "handler interrupted by shutdown");
                        return;
                    }

                    msg.prev_err = error.to_string();
                    if msg.retried < msg.max_retry {
                        run_callback("on_retry", &task.opts.callbacks.on_retry, &ctx);
                        if let Err(error) = self.server.retry_job(&mut msg).await {
                            tracing::error!(%error, uuid = %msg.uuid, "could not requeue job for retry");
                        }
                    } else {
                        run_callback("on_failed", &task.opts.callbacks.on_failed, &ctx);
                        if let Err(error) = self.server.mark_failed(&mut msg).await {
                            tracing::error!(%error, uuid = %msg.uuid, "could not mark job as failed");
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn finish_job(&self, msg: &mut JobMessage, task: &Task, ctx: &JobCtx) {
        run_callback("on_success", &task.opts.callbacks.on_success, ctx);

        if let Some(successor) = msg.job.on_success.clone() {
            let meta = Meta {
                prev_job_results: ctx.results().to_vec(),
            };
            match self.server.enqueue_with_meta(*successor, meta).await {
                Ok(uuid) => msg.on_success_uuid = Some(uuid),
                Err(error) => {
                    // The parent stays in processing: marking it successful
                    // would hide the lost successor.
                    tracing::error!(%error, uuid = %msg.uuid, "could not enqueue chain successor");
                    return;
                }
            }
        }

        if let Err(error) = self.server.mark_successful(msg).await {
            tracing::error!(%error, uuid = %msg.uuid, "could not mark job as successful");
        }
    }
}

fn run_callback(name: &str, callback: &Option<Callback>, ctx: &JobCtx) {
    let Some(callback) = callback else { return };
    if catch_unwind(AssertUnwindSafe(|| callback(ctx))).is_err() {
        tracing::error!(callback = name, uuid = %ctx.uuid(), "state callback panicked");
    }
}
