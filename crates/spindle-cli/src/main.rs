use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use spindle_core::{
    chain, Handler, InMemoryBroker, InMemoryResults, Job, JobCtx, JobError, ServerBuilder,
    TaskOpts,
};

#[derive(Debug, Serialize, Deserialize)]
struct SumPayload {
    arg1: i64,
    arg2: i64,
}

/// Adds the two payload arguments and saves the sum as a decimal string.
struct SumHandler;

#[async_trait]
impl Handler for SumHandler {
    async fn handle(&self, payload: &[u8], ctx: &mut JobCtx) -> Result<(), JobError> {
        let p: SumPayload = serde_json::from_slice(payload)?;
        let sum = p.arg1 + p.arg2;
        println!("{} + {} = {sum}", p.arg1, p.arg2);
        ctx.save(sum.to_string().into_bytes()).await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let server = ServerBuilder::new()
        .broker(Arc::new(InMemoryBroker::new()))
        .results(Arc::new(InMemoryResults::new()))
        .build()
        .await?;

    server.register_task(
        "add",
        Arc::new(SumHandler),
        TaskOpts {
            concurrency: 5,
            ..TaskOpts::default()
        },
    );

    let mut jobs = Vec::new();
    for i in 0..3 {
        let payload = serde_json::to_vec(&SumPayload { arg1: i, arg2: 4 })?;
        jobs.push(Job::new("add", payload));
    }
    let head = chain(jobs)?;
    let uuid = server.enqueue(head).await?;
    println!("enqueued chain head {uuid}");

    let (shutdown, runner) = {
        let server = server.clone();
        let (tx, rx) = watch::channel(false);
        (tx, tokio::spawn(async move { server.start(rx).await }))
    };

    // Wait for all three links of the chain to finish.
    let done = loop {
        let done = server.get_success().await?;
        if done.len() >= 3 {
            break done;
        }
        sleep(Duration::from_millis(50)).await;
    };

    for uuid in done {
        for artifact in server.get_result(uuid).await? {
            println!("{uuid} -> {}", String::from_utf8_lossy(&artifact));
        }
    }

    shutdown.send(true)?;
    runner.await??;
    Ok(())
}
