//! Bounded worker pool for file conversions.
//!
//! Workers pull from a shared `flume` queue, so an idle worker always takes the
//! next pending task and a slow file never holds up the rest. Each conversion
//! runs on tokio's blocking pool; a panic there is caught as a `JoinError` and
//! reported as that task's failure. Results flow back over a single `mpsc`
//! completion channel in the order they finish.

use crate::converter::FileConverter;
use crate::error::ConversionError;
use crate::path_mapper::{ConversionTask, PathMapper};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Outcome of one conversion
#[derive(Debug)]
pub enum Outcome {
    /// PDF written; carries its size in bytes
    Success { bytes: u64 },
    Failure(ConversionError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Completion event for one task, emitted exactly once
#[derive(Debug)]
pub struct ConversionResult {
    pub task: ConversionTask,
    pub outcome: Outcome,
    pub duration: Duration,
}

/// Running pool: a result stream plus the handle that resolves once drained
pub struct PoolRun {
    pub results: mpsc::Receiver<ConversionResult>,
    pub handle: JoinHandle<()>,
}

pub struct WorkerPool {
    concurrency: usize,
    queue_depth: usize,
    mapper: Arc<PathMapper>,
    converter: Arc<FileConverter>,
}

impl WorkerPool {
    pub fn new(concurrency: usize, mapper: Arc<PathMapper>, converter: Arc<FileConverter>) -> Self {
        Self {
            concurrency: concurrency.max(1),
            queue_depth: 2,
            mapper,
            converter,
        }
    }

    /// Pending tasks buffered per worker in the intake queue
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Start converting `tasks`; every task yields exactly one result.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(&self, tasks: Vec<ConversionTask>) -> PoolRun {
        let capacity = self.concurrency * self.queue_depth;
        let (task_tx, task_rx) = flume::bounded::<ConversionTask>(capacity);
        let (result_tx, result_rx) = mpsc::channel::<ConversionResult>(capacity);

        let feeder = tokio::spawn(async move {
            for task in tasks {
                if task_tx.send_async(task).await.is_err() {
                    error!("All workers exited before the task queue was drained");
                    break;
                }
            }
            // dropping the sender lets idle workers see the queue close
        });

        let mut handles = Vec::with_capacity(self.concurrency + 1);
        handles.push(feeder);

        for worker_id in 0..self.concurrency {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let mapper = Arc::clone(&self.mapper);
            let converter = Arc::clone(&self.converter);

            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, task_rx, result_tx, mapper, converter).await;
            }));
        }
        drop(result_tx);

        let handle = tokio::spawn(async move {
            for joined in join_all(handles).await {
                if let Err(e) = joined {
                    error!("Pool task terminated abnormally: {}", e);
                }
            }
            debug!("Worker pool drained");
        });

        PoolRun {
            results: result_rx,
            handle,
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    task_rx: flume::Receiver<ConversionTask>,
    result_tx: mpsc::Sender<ConversionResult>,
    mapper: Arc<PathMapper>,
    converter: Arc<FileConverter>,
) {
    debug!("Worker {} started", worker_id);

    while let Ok(task) = task_rx.recv_async().await {
        let result = execute(task, Arc::clone(&mapper), Arc::clone(&converter)).await;

        if result_tx.send(result).await.is_err() {
            warn!("Worker {}: result receiver dropped, stopping", worker_id);
            break;
        }
    }

    debug!("Worker {} finished", worker_id);
}

/// Run one task on the blocking pool and always produce a result
async fn execute(
    task: ConversionTask,
    mapper: Arc<PathMapper>,
    converter: Arc<FileConverter>,
) -> ConversionResult {
    let started = Instant::now();
    let job = task.clone();

    let outcome = match tokio::task::spawn_blocking(move || {
        mapper.prepare(&job)?;
        converter.convert(&job)
    })
    .await
    {
        Ok(Ok(bytes)) => Outcome::Success { bytes },
        Ok(Err(e)) => Outcome::Failure(e),
        Err(join_error) => Outcome::Failure(ConversionError::Panicked {
            message: panic_message(join_error),
        }),
    };

    ConversionResult {
        task,
        outcome,
        duration: started.elapsed(),
    }
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }

    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
