//! Fixed pool of worker threads draining one FIFO queue.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crate::error::{RpcError, RpcResult};

type Job = Box<dyn FnOnce() + Send>;

/// Worker pool behind every `_async` entry point.
///
/// Jobs run in submission order as workers become free. Dropping the queue
/// lets the workers finish what is already queued, then joins them.
pub struct Workqueue {
    sender: Option<flume::Sender<Job>>,
    receiver: flume::Receiver<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl Workqueue {
    /// Spawn `workers` threads (at least one).
    pub fn new(workers: usize) -> RpcResult<Self> {
        let (sender, receiver) = flume::unbounded::<Job>();
        let count = workers.max(1);
        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let jobs = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("inv-worker-{i}"))
                .spawn(move || {
                    while let Ok(job) = jobs.recv() {
                        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                            tracing::error!(panic = panic_message(&*payload), "job panicked");
                        }
                    }
                })?;
            handles.push(handle);
        }
        tracing::debug!(workers = count, "work queue started");
        Ok(Self {
            sender: Some(sender),
            receiver,
            workers: handles,
        })
    }

    /// Queue `work`; a worker later calls `handler(work)`.
    pub fn push<W, H>(&self, work: W, handler: H) -> RpcResult<()>
    where
        W: Send + 'static,
        H: FnOnce(W) + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(RpcError::QueueStopped)?;
        sender
            .send(Box::new(move || handler(work)))
            .map_err(|_| RpcError::QueueStopped)
    }

    /// Jobs waiting for a worker.
    pub fn size(&self) -> usize {
        self.receiver.len()
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Close the queue, run what is left and join the workers.
    pub fn stop(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            // A job may hold the last reference to the queue.
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                tracing::warn!("worker thread panicked");
            }
        }
        tracing::debug!("work queue stopped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

impl Drop for Workqueue {
    fn drop(&mut self) {
        self.stop();
    }
}
