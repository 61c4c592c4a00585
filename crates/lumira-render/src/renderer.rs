use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use lumira_graph::{TaskGraph, TaskId};

use crate::backend::{Backend, SoftwareBackend};
use crate::config::RendererConfig;
use crate::error::{RenderError, RenderResult};
use crate::optimize;

/// Lifecycle of a single task within one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RenderState {
    Pending = 0,
    Scheduling = 1,
    Executing = 2,
    Done = 3,
    Failed = 4,
}

impl RenderState {
    fn from_u8(v: u8) -> RenderState {
        match v {
            1 => RenderState::Scheduling,
            2 => RenderState::Executing,
            3 => RenderState::Done,
            4 => RenderState::Failed,
            _ => RenderState::Pending,
        }
    }
}

/// Per-task state plus a completion counter, shared across workers.
/// Tasks the pass never reaches (folded out by the optimizer, or past
/// the point of failure) stay `Pending`.
#[derive(Debug)]
pub struct RenderProgress {
    states: Vec<AtomicU8>,
    completed: AtomicUsize,
}

impl RenderProgress {
    fn new(len: usize) -> Self {
        Self {
            states: (0..len).map(|_| AtomicU8::new(RenderState::Pending as u8)).collect(),
            completed: AtomicUsize::new(0),
        }
    }

    fn set_state(&self, id: TaskId, state: RenderState) {
        if let Some(slot) = self.states.get(id.index()) {
            slot.store(state as u8, Ordering::Release);
        }
    }

    pub fn state(&self, id: TaskId) -> RenderState {
        self.states
            .get(id.index())
            .map(|s| RenderState::from_u8(s.load(Ordering::Acquire)))
            .unwrap_or(RenderState::Pending)
    }

    /// Number of tasks executed to completion so far.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }
}

/// Cooperative cancellation flag. Cloning shares the flag; workers poll
/// it between tasks, so an in-flight task still runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Drives a task graph to completion: validates, folds transform
/// chains, then executes in dependency waves on a worker pool.
pub struct Renderer {
    config: RendererConfig,
    pool: rayon::ThreadPool,
    backend: Arc<dyn Backend>,
}

impl Renderer {
    pub fn new() -> RenderResult<Self> {
        Self::with_config(RendererConfig::default())
    }

    pub fn with_config(config: RendererConfig) -> RenderResult<Self> {
        let backend: Arc<dyn Backend> = match config.backend.as_str() {
            "software" => Arc::new(SoftwareBackend),
            other => {
                return Err(RenderError::Config(format!("unknown backend {:?}", other)));
            }
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| RenderError::Config(format!("worker pool: {}", e)))?;
        tracing::debug!(
            "renderer ready: backend={}, threads={}",
            backend.name(),
            pool.current_num_threads()
        );
        Ok(Self { config, pool, backend })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Render the sub-graph reachable from `root`.
    pub fn render(&self, graph: &mut TaskGraph, root: TaskId) -> RenderResult<RenderProgress> {
        self.render_with(graph, root, &CancelToken::new())
    }

    /// Render with an external cancellation handle. Validation and
    /// chain folding happen up front; execution then proceeds wave by
    /// wave, deepest tasks first, every task in a wave in parallel.
    pub fn render_with(
        &self,
        graph: &mut TaskGraph,
        root: TaskId,
        cancel: &CancelToken,
    ) -> RenderResult<RenderProgress> {
        graph.validate(root)?;
        optimize::merge_transform_chains(graph, root);

        let waves = schedule_waves(graph, root);
        let total: usize = waves.iter().map(Vec::len).sum();
        tracing::debug!("rendering {}: {} tasks in {} waves", root, total, waves.len());

        let progress = RenderProgress::new(graph.len());
        for wave in &waves {
            for &id in wave {
                progress.set_state(id, RenderState::Scheduling);
            }
        }

        let graph = &*graph;
        for wave in &waves {
            if cancel.is_cancelled() {
                tracing::debug!("render of {} cancelled", root);
                return Err(RenderError::Cancelled);
            }
            self.pool.install(|| {
                wave.par_iter().try_for_each(|&id| {
                    if cancel.is_cancelled() {
                        return Err(RenderError::Cancelled);
                    }
                    progress.set_state(id, RenderState::Executing);
                    match self.backend.execute(graph, id, self.config.surface_budget) {
                        Ok(()) => {
                            progress.set_state(id, RenderState::Done);
                            progress.completed.fetch_add(1, Ordering::AcqRel);
                            Ok(())
                        }
                        Err(err) => {
                            progress.set_state(id, RenderState::Failed);
                            tracing::warn!("{} failed: {}", id, err);
                            Err(err)
                        }
                    }
                })
            })?;
        }
        Ok(progress)
    }
}

/// Partition the reachable sub-graph into dependency waves: a task's
/// wave index is one past the deepest of its sub-tasks, so everything a
/// task reads from has finished by the time its wave starts. Shared
/// sub-tasks appear exactly once.
fn schedule_waves(graph: &TaskGraph, root: TaskId) -> Vec<Vec<TaskId>> {
    let mut depth: Vec<Option<usize>> = vec![None; graph.len()];
    let mut stack = vec![(root, false)];
    while let Some((id, children_done)) = stack.pop() {
        let Some(node) = graph.get(id) else { continue };
        if children_done {
            let d = node
                .sub_tasks()
                .iter()
                .filter_map(|c| depth.get(c.index()).copied().flatten())
                .max()
                .map_or(0, |m| m + 1);
            depth[id.index()] = Some(d);
        } else if depth[id.index()].is_none() {
            stack.push((id, true));
            for &c in node.sub_tasks() {
                if depth.get(c.index()).is_some_and(|d| d.is_none()) {
                    stack.push((c, false));
                }
            }
        }
    }

    let max_depth = depth.iter().filter_map(|d| *d).max().map_or(0, |m| m + 1);
    let mut waves = vec![Vec::new(); max_depth];
    for id in graph.ids() {
        if let Some(d) = depth[id.index()] {
            waves[d].push(id);
        }
    }
    waves
}
