//! Server façade: registration, enqueueing, queries, and the
//! consumer/worker topology.

mod worker;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::Instrument;
use uuid::Uuid;

use crate::broker::Broker;
use crate::codec;
use crate::domain::{Job, JobMessage, Meta, Status};
use crate::error::Error;
use crate::registry::{Handler, Registry, Task, TaskOpts};
use crate::results::{message_key, result_key, Results};
use crate::scheduler::Scheduler;
use crate::{DEFAULT_QUEUE, INSTRUMENTATION_NAME};

/// Builder for [`Server`]. Fails fast when a required collaborator is
/// missing.
#[derive(Default)]
pub struct ServerBuilder {
    broker: Option<Arc<dyn Broker>>,
    results: Option<Arc<dyn Results>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn results(mut self, results: Arc<dyn Results>) -> Self {
        self.results = Some(results);
        self
    }

    pub async fn build(self) -> Result<Server, Error> {
        let broker = self
            .broker
            .ok_or_else(|| Error::InvalidOptions("broker missing in options".to_string()))?;
        let results = self
            .results
            .ok_or_else(|| Error::InvalidOptions("results missing in options".to_string()))?;

        Ok(Server {
            broker,
            results,
            registry: Arc::new(Registry::default()),
            scheduler: Scheduler::new().await?,
        })
    }
}

/// The runtime façade: holds the broker and results interfaces, the task
/// registry, and the cron scheduler.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Server {
    pub(crate) broker: Arc<dyn Broker>,
    pub(crate) results: Arc<dyn Results>,
    pub(crate) registry: Arc<Registry>,
    scheduler: Scheduler,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").finish_non_exhaustive()
    }
}

impl Server {
    /// Associate `name` with a handler. Registering the same name again
    /// replaces the earlier entry.
    pub fn register_task(&self, name: impl Into<String>, handler: Arc<dyn Handler>, opts: TaskOpts) {
        let name = name.into();
        let mut opts = opts;
        if opts.concurrency == 0 {
            opts.concurrency = 1;
        }
        if opts.queue.is_empty() {
            opts.queue = DEFAULT_QUEUE.to_string();
        }

        tracing::info!(
            task = %name,
            queue = %opts.queue,
            concurrency = opts.concurrency,
            "added handler"
        );
        self.registry.register(Task {
            name,
            handler,
            opts,
        });
    }

    /// Persist and enqueue `job`, returning the uuid assigned to it.
    ///
    /// A job carrying a schedule is registered with the cron scheduler
    /// instead; the returned uuid then identifies the registration, and
    /// each firing enqueues an independent message with its own uuid.
    pub async fn enqueue(&self, job: Job) -> Result<Uuid, Error> {
        self.enqueue_with_meta(job, Meta::default()).await
    }

    /// Enqueue with pre-filled metadata. Used for chain successors, which
    /// observe their predecessor's artifacts through `meta`.
    ///
    /// Boxed explicitly (rather than `async fn`) because this call and
    /// [`Scheduler::add`] are mutually recursive through the cron
    /// callback; an opaque `impl Future` return here defeats rustc's
    /// auto-trait (`Send`) inference on that cycle.
    pub(crate) fn enqueue_with_meta(
        &self,
        job: Job,
        meta: Meta,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Uuid, Error>> + Send + '_>> {
        Box::pin(async move {
            if let Some(expr) = job.opts.schedule.clone() {
                let mut template = job;
                template.opts.schedule = None;
                let registration = self.scheduler.add(&expr, self.clone(), template).await?;
                tracing::info!(schedule = %expr, registration = %registration, "registered scheduled job");
                return Ok(registration);
            }

            let queue = self.resolve_queue(&job);
            let msg = JobMessage::new(job, queue, meta);
            self.enqueue_message(msg).await
        })
    }

    fn resolve_queue(&self, job: &Job) -> String {
        if let Some(queue) = &job.opts.queue {
            return queue.clone();
        }
        match self.registry.get(&job.task) {
            Ok(task) => task.opts.queue.clone(),
            Err(_) => DEFAULT_QUEUE.to_string(),
        }
    }

    async fn enqueue_message(&self, msg: JobMessage) -> Result<Uuid, Error> {
        let encoded = codec::marshal(&msg)?;
        // The queued record is written before the broker hand-off so the
        // uuid is queryable even if the hand-off fails.
        self.results.set(&message_key(msg.uuid), encoded.clone()).await?;
        self.broker.enqueue(&msg.queue, encoded).await?;
        tracing::debug!(uuid = %msg.uuid, queue = %msg.queue, task = %msg.job.task, "enqueued job");
        Ok(msg.uuid)
    }

    /// Artifacts saved by the job's handler, in append order. A job that
    /// saved nothing yields an empty list.
    pub async fn get_result(&self, uuid: Uuid) -> Result<Vec<Vec<u8>>, Error> {
        match self.results.get(&result_key(uuid)).await {
            Ok(encoded) => codec::unmarshal(&encoded),
            Err(Error::NotFound(_)) => Ok(Vec::new()),
            Err(error) => Err(error),
        }
    }

    /// The persisted state record for `uuid`.
    pub async fn get_job(&self, uuid: Uuid) -> Result<JobMessage, Error> {
        let encoded = self.results.get(&message_key(uuid)).await?;
        codec::unmarshal(&encoded)
    }

    /// Uuids of jobs that completed successfully.
    pub async fn get_success(&self) -> Result<Vec<Uuid>, Error> {
        self.results.get_success().await
    }

    /// Uuids of jobs that exhausted their retries.
    pub async fn get_failed(&self) -> Result<Vec<Uuid>, Error> {
        self.results.get_failed().await
    }

    /// Start the scheduler and, for every registered task, one consumer
    /// plus `concurrency` workers wired to the same channel.
    ///
    /// Blocks until `shutdown` flips and every spawned task has wound
    /// down. Workers finish the job they are executing; no new jobs are
    /// picked up after the signal.
    pub async fn start(&self, shutdown: watch::Receiver<bool>) -> Result<(), Error> {
        let span = tracing::info_span!(target: INSTRUMENTATION_NAME, "start");
        self.run(shutdown).instrument(span).await
    }

    async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), Error> {
        self.scheduler.start().await?;

        let mut joins = Vec::new();
        for task in self.registry.snapshot() {
            let (tx, rx) = mpsc::channel::<Vec<u8>>(1);
            let input = Arc::new(Mutex::new(rx));

            let broker = Arc::clone(&self.broker);
            let queue = task.opts.queue.clone();
            let consumer_shutdown = shutdown.clone();
            joins.push(tokio::spawn(async move {
                tracing::info!(queue = %queue, "starting task consumer");
                broker.consume(&queue, tx, consumer_shutdown).await;
            }));

            for id in 0..task.opts.concurrency {
                let worker = worker::Worker::new(id, self.clone(), Arc::clone(&input));
                joins.push(tokio::spawn(worker.run(shutdown.clone())));
            }
        }

        for join in joins {
            if let Err(error) = join.await {
                tracing::error!(%error, "runtime task panicked");
            }
        }

        self.scheduler.shutdown().await;
        Ok(())
    }

    async fn guard_terminal(&self, uuid: Uuid) -> Result<(), Error> {
        if let Ok(stored) = self.get_job(uuid).await {
            if stored.status.is_terminal() {
                return Err(Error::Terminal {
                    uuid,
                    status: stored.status,
                });
            }
        }
        Ok(())
    }

    async fn put_message(&self, msg: &JobMessage) -> Result<(), Error> {
        let encoded = codec::marshal(msg)?;
        self.results.set(&message_key(msg.uuid), encoded).await
    }

    pub(crate) async fn mark_processing(&self, msg: &mut JobMessage) -> Result<(), Error> {
        let span =
            tracing::info_span!(target: INSTRUMENTATION_NAME, "status_processing", uuid = %msg.uuid);
        async {
            self.guard_terminal(msg.uuid).await?;
            msg.status = Status::Processing;
            msg.processed_at = Utc::now();
            self.put_message(msg).await
        }
        .instrument(span)
        .await
    }

    /// Increment the retry counter, record the retrying state, and put the
    /// message back on its queue. The state write precedes the re-enqueue,
    /// so a hand-off failure still leaves a record of the attempt.
    pub(crate) async fn retry_job(&self, msg: &mut JobMessage) -> Result<(), Error> {
        let span = tracing::info_span!(target: INSTRUMENTATION_NAME, "retry_job", uuid = %msg.uuid);
        async {
            self.guard_terminal(msg.uuid).await?;
            msg.retried += 1;
            msg.status = Status::Retrying;
            msg.processed_at = Utc::now();
            self.put_message(msg).await?;

            let encoded = codec::marshal(msg)?;
            self.broker.enqueue(&msg.queue, encoded).await
        }
        .instrument(span)
        .await
    }

    /// Record success. The index entry is written before the state record:
    /// a reader seeing the index without the record is tolerated, the
    /// converse is not.
    pub(crate) async fn mark_successful(&self, msg: &mut JobMessage) -> Result<(), Error> {
        let span =
            tracing::info_span!(target: INSTRUMENTATION_NAME, "status_successful", uuid = %msg.uuid);
        async {
            self.guard_terminal(msg.uuid).await?;
            self.results.set_success(msg.uuid).await?;
            msg.status = Status::Successful;
            msg.processed_at = Utc::now();
            self.put_message(msg).await
        }
        .instrument(span)
        .await
    }

    pub(crate) async fn mark_failed(&self, msg: &mut JobMessage) -> Result<(), Error> {
        let span =
            tracing::info_span!(target: INSTRUMENTATION_NAME, "status_failed", uuid = %msg.uuid);
        async {
            self.guard_terminal(msg.uuid).await?;
            self.results.set_failed(msg.uuid).await?;
            msg.status = Status::Failed;
            msg.processed_at = Utc::now();
            self.put_message(msg).await
        }
        .instrument(span)
        .await
    }
}
