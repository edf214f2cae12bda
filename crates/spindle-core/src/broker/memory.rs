//! In-memory broker implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex, Notify};

use super::Broker;
use crate::error::Error;

#[derive(Default)]
struct QueueState {
    messages: VecDeque<Vec<u8>>,
    notify: Arc<Notify>,
}

/// Broker holding queues in process memory, for tests and single-process
/// deployments.
///
/// Delivery is at-most-once: a message handed to a consumer is gone from
/// the queue, so a process crash mid-handler loses it.
#[derive(Default)]
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, QueueState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn enqueue(&self, queue: &str, payload: Vec<u8>) -> Result<(), Error> {
        let notify = {
            let mut queues = self.queues.lock().await;
            let state = queues.entry(queue.to_string()).or_default();
            state.messages.push_back(payload);
            Arc::clone(&state.notify)
        };

        // Notify outside the lock. notify_one stores a permit, so a
        // consumer that checks the queue just before this call still wakes.
        notify.notify_one();
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        out: mpsc::Sender<Vec<u8>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let (message, notify) = {
                let mut queues = self.queues.lock().await;
                let state = queues.entry(queue.to_string()).or_default();
                (state.messages.pop_front(), Arc::clone(&state.notify))
            };

            match message {
                Some(payload) => {
                    if out.send(payload).await.is_err() {
                        // Every worker is gone; nothing left to deliver to.
                        break;
                    }
                }
                None => {
                    tokio::select! {
                        _ = notify.notified() => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
}
