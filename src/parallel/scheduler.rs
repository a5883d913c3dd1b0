use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::parallel::tasks::{TaskId, TaskOutput, TaskStatus, TaskStore};

pub type Job = Box<dyn FnOnce() -> Result<TaskOutput> + Send + 'static>;

struct Envelope {
    id: TaskId,
    job: Job,
}

/// Fixed pool of worker threads fed through a bounded queue.
///
/// Submission never blocks: a full queue rejects the task. Jobs run to
/// completion; there is no cancellation.
pub struct TaskScheduler {
    sender: Option<Sender<Envelope>>,
    workers: Vec<JoinHandle<()>>,
    store: Arc<TaskStore>,
}

impl TaskScheduler {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = bounded::<Envelope>(config.task_queue_capacity);
        let store = Arc::new(TaskStore::new(config.task_retention, config.abandoned_task_ttl));

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let receiver = receiver.clone();
            let store = store.clone();
            let handle = thread::Builder::new()
                .name(format!("tm-worker-{}", index))
                .spawn(move || Self::worker_loop(receiver, store))?;
            workers.push(handle);
        }

        info!(workers = config.workers, queue = config.task_queue_capacity, "Task scheduler started");
        Ok(TaskScheduler {
            sender: Some(sender),
            workers,
            store,
        })
    }

    fn worker_loop(receiver: Receiver<Envelope>, store: Arc<TaskStore>) {
        while let Ok(Envelope { id, job }) = receiver.recv() {
            debug!(task = %id, "Task started");
            let outcome = match catch_unwind(AssertUnwindSafe(job)) {
                Ok(Ok(output)) => {
                    debug!(task = %id, "Task completed");
                    Ok(output)
                }
                Ok(Err(err)) => {
                    warn!(task = %id, error = %err, "Task failed");
                    Err(err.to_string())
                }
                Err(panic) => {
                    let message = panic_message(panic);
                    error!(task = %id, panic = %message, "Task panicked");
                    Err(format!("Internal: task panicked: {}", message))
                }
            };
            store.finish(&id, outcome);
        }
    }

    pub fn submit<F>(&self, job: F) -> Result<TaskId>
    where
        F: FnOnce() -> Result<TaskOutput> + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::InvalidState, "Task scheduler is shut down"))?;

        let id = TaskId::new();
        self.store.insert_pending(id);
        match sender.try_send(Envelope { id, job: Box::new(job) }) {
            Ok(()) => {
                debug!(task = %id, "Task submitted");
                Ok(id)
            }
            Err(TrySendError::Full(_)) => {
                self.store.remove(&id);
                Err(Error::new(ErrorKind::InvalidState, "Task queue is full"))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.store.remove(&id);
                Err(Error::new(ErrorKind::InvalidState, "Task scheduler is shut down"))
            }
        }
    }

    pub fn status(&self, id: &TaskId) -> Result<TaskStatus> {
        self.store.poll(id)
    }

    /// Polls until the task is terminal or `timeout` passes.
    pub fn wait(&self, id: &TaskId, timeout: Duration) -> Result<TaskStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.store.poll(id)?;
            if status.is_terminal() || Instant::now() >= deadline {
                return Ok(status);
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn pending(&self) -> usize {
        self.store.pending()
    }

    /// Stops accepting tasks and waits for queued ones to finish.
    pub fn shutdown(&mut self) {
        // Workers drain the queue, then see the channel disconnect
        if self.sender.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        info!("Task scheduler stopped");
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
