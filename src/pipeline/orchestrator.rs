//! Pipeline driver: seed discovery, start the three pools, drain in stage order, tear down.
//!
//! discovery (file → line tasks) → enrichment (line task → annotated task)
//! → dispatch (annotated task → notification, serialized).

use anyhow::{Context, Result};
use crossbeam_channel::{Sender, unbounded};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::notify::Notify;
use crate::error::{DrainTimeoutError, PipelineError};
use crate::pipeline::context::{Collaborators, DISCOVERY, DISPATCH, ENRICHMENT, PipelineQueues};
use crate::pipeline::pool::{CancelToken, WorkerPool};
use crate::pipeline::queue::WorkQueue;
use crate::pipeline::serialized::{ReleaseGuard, SerializedResource};
use crate::pipeline::stage::Stage;
use crate::types::{
    AnnotatedTask, FileTask, LineTask, NagOpts, RunSummary, StageWorkers, TaskFailure,
};

type StagePools = (
    WorkerPool<FileTask>,
    WorkerPool<LineTask>,
    WorkerPool<AnnotatedTask>,
);

/// Owns the queues and the notification channel for one run.
pub struct PipelineDriver<N> {
    queues: PipelineQueues,
    collaborators: Collaborators,
    channel: Arc<SerializedResource<N>>,
    workers: StageWorkers,
    drain_timeout: Option<Duration>,
    cancel: CancelToken,
}

impl<N> PipelineDriver<N>
where
    N: Notify + 'static,
{
    /// `notifier` is an already-acquired channel; the driver releases it exactly once.
    pub fn new(collaborators: Collaborators, notifier: N, opts: &NagOpts) -> Self {
        PipelineDriver {
            queues: PipelineQueues::new(),
            collaborators,
            channel: Arc::new(SerializedResource::new(notifier)),
            workers: opts.workers,
            drain_timeout: opts.drain_timeout,
            cancel: CancelToken::new(),
        }
    }

    /// Share an externally owned cancel flag (e.g. wired to Ctrl-C).
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run to completion. `enumerate` is called once, before any worker starts; its failure is
    /// fatal. The notification channel is released on every path out of this function.
    ///
    /// If anything fails once the pools are running (a drain timeout, most likely), the run is
    /// cancelled so leftover items are skipped, and the channel is released without waiting on
    /// a call that may never return. After that no task reaches the channel.
    pub fn run<E>(self, enumerate: E) -> Result<RunSummary>
    where
        E: FnOnce() -> Result<Vec<FileTask>>,
    {
        let mut channel_guard =
            ReleaseGuard::new(Arc::clone(&self.channel), |n: &mut N| n.release());

        // Phase 1: seeding
        let files = enumerate().context("enumerate source files")?;
        info!("Scanning {} files", files.len());
        for f in files {
            self.queues.discovery.enqueue(f);
        }

        // Phase 2: pools running
        let (failure_tx, failure_rx) = unbounded();
        let (discovery, enrichment, dispatch) = match self.start_pools(failure_tx) {
            Ok(pools) => pools,
            Err(e) => return Err(self.abort(channel_guard, e)),
        };

        // Phase 3: draining. The pools are locals, so on the error path they are dropped
        // (closed and detached) only after `abort` has cancelled the run.
        if let Err(e) = self.drain_in_order() {
            return Err(self.abort(channel_guard, e.into()));
        }

        // Phase 4: teardown
        let discovery = discovery.stop();
        let enrichment = enrichment.stop();
        let dispatch = dispatch.stop();
        channel_guard
            .release()
            .context("release notification channel")?;

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            warn!("Run cancelled; remaining tasks were skipped");
        }
        Ok(RunSummary {
            files: self.queues.discovery.counts().enqueued_total,
            line_tasks: self.queues.enrichment.counts().enqueued_total,
            annotated: self.queues.dispatch.counts().enqueued_total,
            notified: dispatch.completed,
            discovery,
            enrichment,
            dispatch,
            failures: failure_rx.try_iter().collect(),
            cancelled,
        })
    }

    fn start_pools(&self, failure_tx: Sender<TaskFailure>) -> Result<StagePools> {
        let discovery = self
            .discovery_stage()
            .start(self.cancel.clone(), failure_tx.clone())?;
        let enrichment = self
            .enrichment_stage()
            .start(self.cancel.clone(), failure_tx.clone())?;
        let dispatch = self
            .dispatch_stage()
            .start(self.cancel.clone(), failure_tx)?;
        Ok((discovery, enrichment, dispatch))
    }

    /// Later stages are fed only by earlier ones, so once discovery has drained no more line
    /// tasks can appear, and likewise for enrichment.
    fn drain_in_order(&self) -> Result<(), DrainTimeoutError> {
        self.wait(&self.queues.discovery)?;
        debug!("{} drained", DISCOVERY);
        self.wait(&self.queues.enrichment)?;
        debug!("{} drained", ENRICHMENT);
        self.wait(&self.queues.dispatch)?;
        debug!("{} drained", DISPATCH);
        Ok(())
    }

    /// Failure after the pools started: stop work, release the channel if nobody holds it.
    fn abort(&self, mut channel_guard: ReleaseGuard<N>, err: anyhow::Error) -> anyhow::Error {
        self.cancel.cancel();
        match channel_guard.release_if_idle() {
            Ok(true) => debug!("notification channel released after failure"),
            Ok(false) => warn!("notification channel busy in a pending call; release skipped"),
            Err(e) => warn!("release notification channel: {:#}", e),
        }
        err
    }

    fn wait<T>(&self, queue: &WorkQueue<T>) -> Result<(), DrainTimeoutError> {
        match self.drain_timeout {
            Some(t) => queue.wait_until_drained_timeout(t),
            None => {
                queue.wait_until_drained();
                Ok(())
            }
        }
    }

    fn discovery_stage(&self) -> Stage<FileTask, LineTask> {
        let scanner = Arc::clone(&self.collaborators.scanner);
        Stage::new(
            DISCOVERY,
            Arc::clone(&self.queues.discovery),
            self.workers.discovery,
            move |task: FileTask| {
                let found = scanner
                    .scan(&task.path)
                    .map_err(|source| PipelineError::Scan {
                        file: task.path.clone(),
                        source,
                    })?;
                debug!("{}: {} undocumented declarations", task, found.len());
                Ok(found
                    .into_iter()
                    .map(|(line, _)| LineTask {
                        path: task.path.clone(),
                        line,
                    })
                    .collect())
            },
        )
        .with_output(Arc::clone(&self.queues.enrichment))
    }

    fn enrichment_stage(&self) -> Stage<LineTask, AnnotatedTask> {
        let lookup = Arc::clone(&self.collaborators.lookup);
        Stage::new(
            ENRICHMENT,
            Arc::clone(&self.queues.enrichment),
            self.workers.enrichment,
            move |task: LineTask| {
                let identity = lookup.lookup(&task.path, task.line)?;
                Ok(vec![task.annotate(identity)])
            },
        )
        .with_output(Arc::clone(&self.queues.dispatch))
    }

    fn dispatch_stage(&self) -> Stage<AnnotatedTask, ()> {
        let channel = Arc::clone(&self.channel);
        Stage::terminal(
            DISPATCH,
            Arc::clone(&self.queues.dispatch),
            self.workers.dispatch,
            move |task: AnnotatedTask| {
                match channel.invoke(|n| n.notify(&task.identity, &task.path, task.line)) {
                    Some(sent) => sent.map_err(PipelineError::from),
                    None => Err(PipelineError::Released("notification channel")),
                }
            },
        )
    }
}
