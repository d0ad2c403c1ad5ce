//! Queues and collaborators owned by one pipeline run.

use std::sync::Arc;

use crate::engine::blame::Lookup;
use crate::engine::scan::Scan;
use crate::pipeline::queue::WorkQueue;
use crate::types::{AnnotatedTask, FileTask, LineTask};

pub const DISCOVERY: &str = "discovery";
pub const ENRICHMENT: &str = "enrichment";
pub const DISPATCH: &str = "dispatch";

/// The three stage queues. Constructed per run; nothing here is global.
#[derive(Clone)]
pub struct PipelineQueues {
    pub discovery: Arc<WorkQueue<FileTask>>,
    pub enrichment: Arc<WorkQueue<LineTask>>,
    pub dispatch: Arc<WorkQueue<AnnotatedTask>>,
}

impl PipelineQueues {
    pub fn new() -> Self {
        PipelineQueues {
            discovery: Arc::new(WorkQueue::new(DISCOVERY)),
            enrichment: Arc::new(WorkQueue::new(ENRICHMENT)),
            dispatch: Arc::new(WorkQueue::new(DISPATCH)),
        }
    }
}

impl Default for PipelineQueues {
    fn default() -> Self {
        Self::new()
    }
}

/// External collaborators for discovery and enrichment. Both are shared by every worker.
#[derive(Clone)]
pub struct Collaborators {
    pub scanner: Arc<dyn Scan>,
    pub lookup: Arc<dyn Lookup>,
}

impl Collaborators {
    pub fn new(scanner: impl Scan + 'static, lookup: impl Lookup + 'static) -> Self {
        Collaborators {
            scanner: Arc::new(scanner),
            lookup: Arc::new(lookup),
        }
    }
}
