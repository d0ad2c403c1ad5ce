//! Fixed-size worker pools bound to one [`WorkQueue`].

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use log::{debug, error, warn};
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crate::error::PipelineError;
use crate::pipeline::queue::WorkQueue;
use crate::types::{StageStats, TaskFailure};

/// Cooperative cancellation flag shared by every worker of a run.
/// Once set, workers keep dequeuing and marking items done but skip processing.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct PoolCounters {
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl PoolCounters {
    fn snapshot(&self) -> StageStats {
        StageStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Everything one worker thread needs besides the handler.
struct WorkerContext<T> {
    stage: &'static str,
    queue: Arc<WorkQueue<T>>,
    cancel: CancelToken,
    failures: Sender<TaskFailure>,
    counters: Arc<PoolCounters>,
}

/// Running workers for one stage. Stop with [`WorkerPool::stop`] after the queue drained;
/// dropping the pool closes the queue and detaches the threads instead of joining them.
pub struct WorkerPool<T> {
    stage: &'static str,
    queue: Arc<WorkQueue<T>>,
    handles: Vec<JoinHandle<()>>,
    counters: Arc<PoolCounters>,
}

impl<T> WorkerPool<T>
where
    T: Display + Send + 'static,
{
    /// Spawn `workers` threads, each looping dequeue → `handler` → `mark_done` on `queue`.
    /// A failing or panicking handler is reported on `failures` and the item is still marked done.
    pub fn start<F>(
        stage: &'static str,
        queue: Arc<WorkQueue<T>>,
        workers: usize,
        cancel: CancelToken,
        failures: Sender<TaskFailure>,
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(T) -> Result<(), PipelineError> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let counters = Arc::new(PoolCounters::default());
        let mut pool = WorkerPool {
            stage,
            queue: Arc::clone(&queue),
            handles: Vec::with_capacity(workers),
            counters: Arc::clone(&counters),
        };
        for i in 0..workers.max(1) {
            let ctx = WorkerContext {
                stage,
                queue: Arc::clone(&queue),
                cancel: cancel.clone(),
                failures: failures.clone(),
                counters: Arc::clone(&counters),
            };
            let handler = Arc::clone(&handler);
            let handle = thread::Builder::new()
                .name(format!("{stage}-{i}"))
                .spawn(move || worker_loop(ctx, handler.as_ref()))
                .with_context(|| format!("spawn {stage} worker {i}"))?;
            pool.handles.push(handle);
        }
        debug!("{}: started {} workers", stage, pool.handles.len());
        Ok(pool)
    }
}

impl<T> WorkerPool<T> {
    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Close the queue, join every worker and return the final counters.
    pub fn stop(mut self) -> StageStats {
        self.queue.close();
        for h in std::mem::take(&mut self.handles) {
            if h.join().is_err() {
                error!("{}: worker thread panicked outside a task", self.stage);
            }
        }
        debug!("{}: workers stopped", self.stage);
        self.counters.snapshot()
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.queue.close();
            debug!(
                "{}: detaching {} workers without join",
                self.stage,
                self.handles.len()
            );
        }
    }
}

fn worker_loop<T, F>(ctx: WorkerContext<T>, handler: &F)
where
    T: Display,
    F: Fn(T) -> Result<(), PipelineError>,
{
    while let Some(item) = ctx.queue.dequeue() {
        if ctx.cancel.is_cancelled() {
            ctx.counters.skipped.fetch_add(1, Ordering::Relaxed);
            ctx.queue.mark_done();
            continue;
        }
        let label = item.to_string();
        let error = match panic::catch_unwind(AssertUnwindSafe(|| handler(item))) {
            Ok(Ok(())) => None,
            Ok(Err(PipelineError::Released(what))) => {
                debug!("{}: skipping {}: {} already released", ctx.stage, label, what);
                ctx.counters.skipped.fetch_add(1, Ordering::Relaxed);
                ctx.queue.mark_done();
                continue;
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };
        match error {
            None => {
                ctx.counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Some(error) => {
                warn!("{}: dropping {}: {}", ctx.stage, label, error);
                ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
                let _ = ctx.failures.send(TaskFailure {
                    stage: ctx.stage,
                    task: label,
                    error,
                });
            }
        }
        ctx.queue.mark_done();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("worker panicked: {msg}")
}
