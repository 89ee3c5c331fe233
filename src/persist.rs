//! Best-effort durable write queue.
//!
//! Mutations commit to memory first, then hand the affected slice to this
//! queue. A background worker applies the writes in order against the
//! [`KvStorage`] backend; failures are logged and never surfaced back to the
//! mutation's caller.

use crate::storage::KvStorage;
use crossbeam_channel::{unbounded, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::error;

/// A single durable write.
#[derive(Debug)]
enum WriteJob {
    Put { key: String, value: String },
    Delete { key: String },
    /// Barrier: acknowledged once every prior job has been applied.
    Flush(Sender<()>),
}

/// Fire-and-forget persistence worker.
///
/// Dropping the queue closes the channel; the worker drains what was already
/// enqueued and exits.
pub struct PersistQueue {
    sender: Sender<WriteJob>,
    worker: Option<JoinHandle<()>>,
}

impl PersistQueue {
    /// Spawn the worker thread over the given backend.
    pub fn new(storage: Arc<dyn KvStorage>) -> Self {
        let (sender, receiver) = unbounded::<WriteJob>();

        let worker = std::thread::Builder::new()
            .name("climblog-persist".into())
            .spawn(move || {
                for job in receiver {
                    match job {
                        WriteJob::Put { key, value } => {
                            if let Err(e) = storage.set(&key, &value) {
                                error!(key = %key, error = %e, "failed to persist slice");
                            }
                        }
                        WriteJob::Delete { key } => {
                            if let Err(e) = storage.remove(&key) {
                                error!(key = %key, error = %e, "failed to remove slice");
                            }
                        }
                        WriteJob::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            })
            .expect("failed to spawn persistence worker");

        Self {
            sender,
            worker: Some(worker),
        }
    }

    /// Enqueue a write. Returns immediately.
    pub fn put(&self, key: &str, value: String) {
        let _ = self.sender.send(WriteJob::Put {
            key: key.to_string(),
            value,
        });
    }

    /// Enqueue a key removal. Returns immediately.
    pub fn delete(&self, key: &str) {
        let _ = self.sender.send(WriteJob::Delete {
            key: key.to_string(),
        });
    }

    /// Block until every previously enqueued job has been applied.
    pub fn flush(&self) {
        let (ack, done) = crossbeam_channel::bounded(1);
        if self.sender.send(WriteJob::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }
}

impl Drop for PersistQueue {
    fn drop(&mut self) {
        // Close the channel so the worker drains and exits
        let (closed_sender, _) = unbounded();
        self.sender = closed_sender;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
