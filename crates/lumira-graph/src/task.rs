use std::sync::Arc;

use lumira_core::{BlendMode, Color, Mat23, PixelBuffer, Rect, RectI};

use crate::surface::SurfaceResource;

/// Index of a task node inside its [`TaskGraph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Blur kernel selection for [`TaskKind::Blur`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurKind {
    Box,
    Gaussian,
}

/// The closed set of rendering operations. Dispatch over this enum is
/// exhaustive and compiler-checked.
#[derive(Debug, Clone)]
pub enum TaskKind {
    /// Copy pre-existing pixels into the target (leaf).
    Import { pixels: Arc<PixelBuffer> },
    /// Fill the target rectangle with one color (leaf).
    Solid { color: Color },
    /// Affine transform of the single sub-task's result.
    Transform { matrix: Mat23 },
    /// Blend the ordered sub-task results with one mode.
    Blend { mode: BlendMode },
    /// Alpha-composite the ordered sub-task results ("over").
    Composite,
    /// Filter the single sub-task's result.
    Blur { kind: BlurKind, radius: f64 },
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Import { .. } => "import",
            TaskKind::Solid { .. } => "solid",
            TaskKind::Transform { .. } => "transform",
            TaskKind::Blend { .. } => "blend",
            TaskKind::Composite => "composite",
            TaskKind::Blur { .. } => "blur",
        }
    }

    /// Whether this kind takes exactly one sub-task.
    fn wants_single_child(&self) -> bool {
        matches!(self, TaskKind::Transform { .. } | TaskKind::Blur { .. })
    }

    fn is_leaf(&self) -> bool {
        matches!(self, TaskKind::Import { .. } | TaskKind::Solid { .. })
    }
}

/// One node of the rendering graph: an operation, the surface it writes,
/// the pixel rectangle it writes into, the logical rectangle it reads
/// from, and the sub-tasks that must complete first.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub kind: TaskKind,
    pub target: SurfaceResource,
    /// Pixel-space rectangle inside the target surface bounds.
    pub target_rect: RectI,
    /// Logical/compositional rectangle this node's content covers.
    pub source_rect: Rect,
    pub children: Vec<TaskId>,
}

impl TaskNode {
    pub fn new(kind: TaskKind, target: SurfaceResource, target_rect: RectI, source_rect: Rect) -> Self {
        Self { kind, target, target_rect, source_rect, children: Vec::new() }
    }

    pub fn with_children(mut self, children: Vec<TaskId>) -> Self {
        self.children = children;
        self
    }

    /// The primary child, used by wrapping tasks (transform, blur).
    pub fn sub_task(&self) -> Option<TaskId> {
        self.children.first().copied()
    }

    pub fn sub_tasks(&self) -> &[TaskId] {
        &self.children
    }
}

/// Structural errors: a malformed graph is a defect in the authoring
/// layer, caught before any node executes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("{0} is not a node of this graph")]
    UnknownTask(TaskId),

    #[error("{parent} references unknown sub-task {child}")]
    UnknownChild { parent: TaskId, child: TaskId },

    #[error("{0} participates in a dependency cycle")]
    Cycle(TaskId),

    #[error("{task}: target rectangle {rect:?} exceeds the {width}x{height} target surface")]
    TargetOutOfBounds { task: TaskId, rect: RectI, width: u32, height: u32 },

    #[error("{task}: {kind} task expects {expected} sub-task(s), found {found}")]
    Arity { task: TaskId, kind: &'static str, expected: &'static str, found: usize },

    #[error("{task}: source rectangle is empty or inverted")]
    InvalidSourceRect { task: TaskId },

    #[error("{task}: blur radius {radius} is not a finite non-negative number")]
    InvalidBlurRadius { task: TaskId, radius: f64 },
}

/// Arena of task nodes. Layers append nodes bottom-up and hand the root
/// id to the renderer; the graph itself is transient and consumed per
/// render request.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: TaskNode) -> TaskId {
        let id = TaskId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        (0..self.nodes.len()).map(TaskId)
    }

    /// Validate the subgraph reachable from `root`: every referenced id
    /// exists, no dependency cycle, every target rectangle lies within
    /// its surface, and per-kind arity holds. Runs before scheduling;
    /// a failure here aborts the request without executing anything.
    pub fn validate(&self, root: TaskId) -> Result<(), GraphError> {
        if self.get(root).is_none() {
            return Err(GraphError::UnknownTask(root));
        }

        const WHITE: u8 = 0;
        const GREY: u8 = 1;
        const BLACK: u8 = 2;
        let mut color = vec![WHITE; self.nodes.len()];
        // DFS with an explicit stack of (node, next child index).
        let mut stack: Vec<(TaskId, usize)> = vec![(root, 0)];
        color[root.0] = GREY;
        self.validate_node(root)?;

        while let Some((id, child_idx)) = stack.pop() {
            let node = &self.nodes[id.0];
            if child_idx < node.children.len() {
                stack.push((id, child_idx + 1));
                let child = node.children[child_idx];
                let Some(_) = self.get(child) else {
                    return Err(GraphError::UnknownChild { parent: id, child });
                };
                match color[child.0] {
                    GREY => return Err(GraphError::Cycle(child)),
                    WHITE => {
                        color[child.0] = GREY;
                        self.validate_node(child)?;
                        stack.push((child, 0));
                    }
                    _ => {}
                }
            } else {
                color[id.0] = BLACK;
            }
        }
        Ok(())
    }

    fn validate_node(&self, id: TaskId) -> Result<(), GraphError> {
        let node = &self.nodes[id.0];
        let bounds = node.target.bounds();
        if !node.target_rect.is_valid() || !bounds.contains(&node.target_rect) {
            return Err(GraphError::TargetOutOfBounds {
                task: id,
                rect: node.target_rect,
                width: node.target.width(),
                height: node.target.height(),
            });
        }
        if !node.source_rect.is_valid() {
            return Err(GraphError::InvalidSourceRect { task: id });
        }
        let found = node.children.len();
        if node.kind.wants_single_child() && found != 1 {
            return Err(GraphError::Arity {
                task: id,
                kind: node.kind.name(),
                expected: "exactly one",
                found,
            });
        }
        if node.kind.is_leaf() && found != 0 {
            return Err(GraphError::Arity {
                task: id,
                kind: node.kind.name(),
                expected: "no",
                found,
            });
        }
        if let TaskKind::Blur { radius, .. } = node.kind {
            if !radius.is_finite() || radius < 0.0 {
                return Err(GraphError::InvalidBlurRadius { task: id, radius });
            }
        }
        Ok(())
    }
}
