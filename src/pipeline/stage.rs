//! A named pipeline phase: input queue, worker count, transform and optional output queue.

use anyhow::Result;
use crossbeam_channel::Sender;
use std::fmt::Display;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::pipeline::pool::{CancelToken, WorkerPool};
use crate::pipeline::queue::WorkQueue;
use crate::types::TaskFailure;

type Transform<T, U> = dyn Fn(T) -> Result<Vec<U>, PipelineError> + Send + Sync;

pub struct Stage<T, U> {
    name: &'static str,
    input: Arc<WorkQueue<T>>,
    output: Option<Arc<WorkQueue<U>>>,
    workers: usize,
    transform: Arc<Transform<T, U>>,
}

impl<T, U> Stage<T, U>
where
    T: Display + Send + 'static,
    U: Send + 'static,
{
    /// `transform` maps one input to zero or more outputs for the output queue.
    pub fn new<F>(
        name: &'static str,
        input: Arc<WorkQueue<T>>,
        workers: usize,
        transform: F,
    ) -> Self
    where
        F: Fn(T) -> Result<Vec<U>, PipelineError> + Send + Sync + 'static,
    {
        Stage {
            name,
            input,
            output: None,
            workers,
            transform: Arc::new(transform),
        }
    }

    pub fn with_output(mut self, output: Arc<WorkQueue<U>>) -> Self {
        self.output = Some(output);
        self
    }

    /// Run the transform on one item and enqueue its outputs. Returns how many were enqueued.
    ///
    /// The worker marks the input done only after this returns, so every output is already
    /// counted downstream by the time the input stops being pending.
    pub fn process(&self, item: T) -> Result<usize, PipelineError> {
        let outputs = (self.transform)(item)?;
        let n = outputs.len();
        match &self.output {
            Some(queue) => outputs.into_iter().for_each(|o| queue.enqueue(o)),
            None if n > 0 => log::debug!("{}: no output queue, dropping {} items", self.name, n),
            None => {}
        }
        Ok(n)
    }

    /// Spawn the stage's workers against its input queue.
    pub fn start(
        self,
        cancel: CancelToken,
        failures: Sender<TaskFailure>,
    ) -> Result<WorkerPool<T>> {
        let name = self.name;
        let input = Arc::clone(&self.input);
        let workers = self.workers;
        WorkerPool::start(name, input, workers, cancel, failures, move |item| {
            self.process(item).map(|_| ())
        })
    }
}

impl<T> Stage<T, ()>
where
    T: Display + Send + 'static,
{
    /// Final stage: the transform only has side effects.
    pub fn terminal<F>(
        name: &'static str,
        input: Arc<WorkQueue<T>>,
        workers: usize,
        action: F,
    ) -> Self
    where
        F: Fn(T) -> Result<(), PipelineError> + Send + Sync + 'static,
    {
        Stage::new(name, input, workers, move |item| action(item).map(|()| Vec::new()))
    }
}
