use std::sync::Arc;

use lumira_core::{BlendMode, Color, Mat23, RectI};

use crate::alternatives::AlternativesRegistry;
use crate::surface::SurfaceResource;
use crate::task::{BlurKind, TaskGraph, TaskId, TaskKind, TaskNode};

/// Everything a layer needs to contribute its task sub-tree: the graph
/// being built, the registry its surfaces register alternatives in, and
/// the pixel bounds of the frame being rendered.
pub struct TaskContext<'a> {
    pub graph: &'a mut TaskGraph,
    pub registry: &'a Arc<AlternativesRegistry>,
    pub frame: RectI,
}

impl<'a> TaskContext<'a> {
    pub fn new(graph: &'a mut TaskGraph, registry: &'a Arc<AlternativesRegistry>, frame: RectI) -> Self {
        Self { graph, registry, frame }
    }

    /// A fresh blank frame-sized target surface.
    pub fn alloc_target(&self) -> SurfaceResource {
        SurfaceResource::new_software(
            self.registry,
            self.frame.width() as u32,
            self.frame.height() as u32,
        )
    }

    fn frame_node(&mut self, kind: TaskKind, children: Vec<TaskId>) -> TaskId {
        let node = TaskNode::new(kind, self.alloc_target(), self.frame, self.frame.to_rect())
            .with_children(children);
        self.graph.add(node)
    }
}

/// A producer of rendering tasks. The composition machinery *pulls* the
/// task tree out of each layer; layers never invoke the renderer.
pub trait Layer: Send + Sync {
    fn build_rendering_task(&self, cx: &mut TaskContext<'_>) -> TaskId;
}

/// Fills the frame with one color.
pub struct SolidLayer {
    pub color: Color,
}

impl Layer for SolidLayer {
    fn build_rendering_task(&self, cx: &mut TaskContext<'_>) -> TaskId {
        cx.frame_node(TaskKind::Solid { color: self.color }, Vec::new())
    }
}

/// Applies an affine transform to the layer beneath it.
pub struct TransformLayer {
    pub matrix: Mat23,
    pub inner: Box<dyn Layer>,
}

impl Layer for TransformLayer {
    fn build_rendering_task(&self, cx: &mut TaskContext<'_>) -> TaskId {
        let child = self.inner.build_rendering_task(cx);
        cx.frame_node(TaskKind::Transform { matrix: self.matrix }, vec![child])
    }
}

/// Blurs the layer beneath it.
pub struct BlurLayer {
    pub kind: BlurKind,
    pub radius: f64,
    pub inner: Box<dyn Layer>,
}

impl Layer for BlurLayer {
    fn build_rendering_task(&self, cx: &mut TaskContext<'_>) -> TaskId {
        let child = self.inner.build_rendering_task(cx);
        cx.frame_node(TaskKind::Blur { kind: self.kind, radius: self.radius }, vec![child])
    }
}

/// Blends a stack of layers bottom-to-top with one mode.
pub struct GroupLayer {
    pub mode: BlendMode,
    pub layers: Vec<Box<dyn Layer>>,
}

impl Layer for GroupLayer {
    fn build_rendering_task(&self, cx: &mut TaskContext<'_>) -> TaskId {
        let children = self
            .layers
            .iter()
            .map(|layer| layer.build_rendering_task(cx))
            .collect();
        cx.frame_node(TaskKind::Blend { mode: self.mode }, children)
    }
}

/// Pull the task trees out of a layer stack and composite them into one
/// root task. The root's target surface holds the displayable frame once
/// the renderer finishes.
pub fn compose_layers(layers: &[Box<dyn Layer>], cx: &mut TaskContext<'_>) -> TaskId {
    let children: Vec<TaskId> = layers
        .iter()
        .map(|layer| layer.build_rendering_task(cx))
        .collect();
    cx.frame_node(TaskKind::Composite, children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers_build_bottom_up() {
        let registry = AlternativesRegistry::new();
        let mut graph = TaskGraph::new();
        let mut cx = TaskContext::new(&mut graph, &registry, RectI::from_size(32, 32));

        let stack = TransformLayer {
            matrix: Mat23::identity(),
            inner: Box::new(SolidLayer { color: Color::RED }),
        };
        let root = stack.build_rendering_task(&mut cx);

        assert_eq!(graph.len(), 2);
        let node = graph.get(root).unwrap();
        assert!(matches!(node.kind, TaskKind::Transform { .. }));
        let child = graph.get(node.sub_task().unwrap()).unwrap();
        assert!(matches!(child.kind, TaskKind::Solid { .. }));
        assert!(graph.validate(root).is_ok());
    }

    #[test]
    fn test_compose_layers_makes_composite_root() {
        let registry = AlternativesRegistry::new();
        let mut graph = TaskGraph::new();
        let mut cx = TaskContext::new(&mut graph, &registry, RectI::from_size(16, 16));

        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(SolidLayer { color: Color::BLUE }),
            Box::new(SolidLayer { color: Color::RED }),
        ];
        let root = compose_layers(&layers, &mut cx);
        let node = graph.get(root).unwrap();
        assert!(matches!(node.kind, TaskKind::Composite));
        assert_eq!(node.sub_tasks().len(), 2);
        assert!(graph.validate(root).is_ok());
    }
}
