use lumira_core::{BlendMode, PixelBuffer, Rect, RectI, Vec2};
use lumira_graph::{BlurKind, GraphError, GroupHold, SurfaceToken, TaskGraph, TaskId, TaskKind, TaskNode};

use crate::blur;
use crate::error::{RenderError, RenderResult};

/// An execution routine provider. The renderer picks the routine by task
/// kind; the backend decides how pixels actually get produced.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Execute one task node, writing into its target surface. All of
    /// the node's sub-tasks have already completed.
    fn execute(&self, graph: &TaskGraph, id: TaskId, budget: Option<usize>) -> RenderResult<()>;
}

/// A snapshot of one completed sub-task's output: the child's pixels plus
/// the rectangles that position them. Snapshotting keeps the child's read
/// lock scoped to the gather step, so a parent never holds a read lock
/// while it blocks on its own write lock.
struct ChildSource {
    pixels: PixelBuffer,
    target_rect: RectI,
    source_rect: Rect,
}

impl ChildSource {
    /// Nearest-neighbor sample at a logical point. Transparent outside
    /// the child's source rectangle.
    fn sample(&self, q: Vec2) -> [u8; 4] {
        let sr = self.source_rect;
        if q.x < sr.x0 || q.x >= sr.x1 || q.y < sr.y0 || q.y >= sr.y1 {
            return [0, 0, 0, 0];
        }
        let tr = self.target_rect;
        let fx = tr.x0 as f64 + (q.x - sr.x0) / sr.width() * tr.width() as f64;
        let fy = tr.y0 as f64 + (q.y - sr.y0) / sr.height() * tr.height() as f64;
        if fx < 0.0 || fy < 0.0 {
            return [0, 0, 0, 0];
        }
        self.pixels
            .get_pixel(fx.floor() as u32, fy.floor() as u32)
            .unwrap_or([0, 0, 0, 0])
    }
}

/// Logical point covered by the center of target pixel (x, y).
fn pixel_to_logical(node: &TaskNode, x: i32, y: i32) -> Vec2 {
    let tr = node.target_rect;
    let sr = node.source_rect;
    Vec2::new(
        sr.x0 + ((x - tr.x0) as f64 + 0.5) / tr.width() as f64 * sr.width(),
        sr.y0 + ((y - tr.y0) as f64 + 0.5) / tr.height() as f64 * sr.height(),
    )
}

/// The CPU backend. Every task kind has a software routine; targets must
/// be (or convert to) software surfaces.
#[derive(Debug, Default)]
pub struct SoftwareBackend;

impl SoftwareBackend {
    fn gather_sources(
        &self,
        graph: &TaskGraph,
        node: &TaskNode,
    ) -> RenderResult<Vec<Option<ChildSource>>> {
        node.sub_tasks()
            .iter()
            .map(|&cid| {
                let child = graph.get(cid).ok_or(GraphError::UnknownTask(cid))?;
                let res = child.target.resource();
                // Pin the group so a concurrent teardown cannot drop the
                // software alternative between lookup and read.
                let _hold = res.registry().and_then(|r| GroupHold::acquire(&r, res));
                let Some(sw) = child.target.convert(SurfaceToken::Software, true, true) else {
                    tracing::debug!("{} has no pixel content; nothing to draw", cid);
                    return Ok(None);
                };
                let Some(surface) = sw.software() else {
                    return Ok(None);
                };
                // The read guard borrows `sw`; keep it in an inner scope
                // so the snapshot outlives neither.
                let source = match surface.lock_read() {
                    Some(guard) => Some(ChildSource {
                        pixels: guard.clone(),
                        target_rect: child.target_rect,
                        source_rect: child.source_rect,
                    }),
                    None => None,
                };
                Ok(source)
            })
            .collect()
    }
}

impl Backend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn execute(&self, graph: &TaskGraph, id: TaskId, budget: Option<usize>) -> RenderResult<()> {
        let node = graph.get(id).ok_or(GraphError::UnknownTask(id))?;
        tracing::trace!("executing {} ({})", id, node.kind.name());

        let sources = self.gather_sources(graph, node)?;

        // Wrapping kinds with nothing to draw must leave the target
        // untouched (still blank), so bail before committing storage.
        let primary = sources.first().and_then(|s| s.as_ref());
        match &node.kind {
            TaskKind::Transform { matrix } => {
                if primary.is_none() {
                    return Ok(());
                }
                if matrix.invert().is_none() {
                    tracing::debug!("{}: singular transform; nothing to draw", id);
                    return Ok(());
                }
            }
            TaskKind::Blur { .. } if primary.is_none() => return Ok(()),
            _ => {}
        }

        let Some(target) = node.target.software() else {
            return Err(RenderError::Backend(format!(
                "{}: the software backend requires a software target surface",
                id
            )));
        };
        let mut out = target.lock_write(budget)?;
        let tr = node.target_rect;

        match &node.kind {
            TaskKind::Solid { color } => {
                out.fill_rect(tr, color.to_rgba8());
            }
            TaskKind::Import { pixels } => {
                let import = ChildSource {
                    pixels: pixels.as_ref().clone(),
                    target_rect: pixels.bounds(),
                    source_rect: node.source_rect,
                };
                for y in tr.y0..tr.y1 {
                    for x in tr.x0..tr.x1 {
                        let q = pixel_to_logical(node, x, y);
                        out.set_pixel(x as u32, y as u32, import.sample(q));
                    }
                }
            }
            TaskKind::Transform { matrix } => {
                // Both checked before the write lock was taken.
                let Some(inv) = matrix.invert() else { return Ok(()) };
                let Some(src) = primary else { return Ok(()) };
                for y in tr.y0..tr.y1 {
                    for x in tr.x0..tr.x1 {
                        let q = inv.transform_point(pixel_to_logical(node, x, y));
                        out.set_pixel(x as u32, y as u32, src.sample(q));
                    }
                }
            }
            TaskKind::Composite | TaskKind::Blend { .. } => {
                let mode = match &node.kind {
                    TaskKind::Blend { mode } => *mode,
                    _ => BlendMode::Normal,
                };
                for src in sources.iter().flatten() {
                    for y in tr.y0..tr.y1 {
                        for x in tr.x0..tr.x1 {
                            let sp = src.sample(pixel_to_logical(node, x, y));
                            if sp[3] == 0 {
                                continue;
                            }
                            out.blend_pixel(x as u32, y as u32, sp, mode);
                        }
                    }
                }
            }
            TaskKind::Blur { kind, radius } => {
                let Some(src) = primary else { return Ok(()) };
                // Beyond the image dimension every window already spans
                // the whole clamped row/column, so cap the radius there;
                // this also keeps the kernel's i32 arithmetic in range.
                let max_r = src.pixels.width().max(src.pixels.height()) as f64;
                let r = radius.round().clamp(0.0, max_r) as u32;
                let mut blurred = src.pixels.clone();
                match kind {
                    BlurKind::Box => blur::box_blur(&src.pixels, &mut blurred, r),
                    BlurKind::Gaussian => blur::gaussian_blur(&src.pixels, &mut blurred, r),
                }
                let blurred = ChildSource {
                    pixels: blurred,
                    target_rect: src.target_rect,
                    source_rect: src.source_rect,
                };
                for y in tr.y0..tr.y1 {
                    for x in tr.x0..tr.x1 {
                        let q = pixel_to_logical(node, x, y);
                        out.set_pixel(x as u32, y as u32, blurred.sample(q));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumira_core::{Color, Mat23};
    use lumira_graph::{AlternativesRegistry, Surface, SurfaceResource};
    use std::sync::Arc;

    fn frame_node(
        registry: &Arc<AlternativesRegistry>,
        kind: TaskKind,
        size: u32,
        children: Vec<TaskId>,
    ) -> TaskNode {
        TaskNode::new(
            kind,
            SurfaceResource::new_software(registry, size, size),
            RectI::from_size(size, size),
            RectI::from_size(size, size).to_rect(),
        )
        .with_children(children)
    }

    #[test]
    fn test_solid_fills_target_rect() {
        let registry = AlternativesRegistry::new();
        let mut graph = TaskGraph::new();
        let id = graph.add(frame_node(
            &registry,
            TaskKind::Solid { color: Color::RED },
            8,
            vec![],
        ));
        SoftwareBackend.execute(&graph, id, None).unwrap();
        let node = graph.get(id).unwrap();
        let pixels = node.target.software().unwrap().read_pixels().unwrap();
        assert_eq!(pixels.get_pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(pixels.get_pixel(7, 7), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_identity_transform_copies_child() {
        let registry = AlternativesRegistry::new();
        let mut graph = TaskGraph::new();
        let leaf = graph.add(frame_node(
            &registry,
            TaskKind::Solid { color: Color::GREEN },
            8,
            vec![],
        ));
        let root = graph.add(frame_node(
            &registry,
            TaskKind::Transform { matrix: Mat23::identity() },
            8,
            vec![leaf],
        ));
        SoftwareBackend.execute(&graph, leaf, None).unwrap();
        SoftwareBackend.execute(&graph, root, None).unwrap();
        let pixels = graph
            .get(root)
            .unwrap()
            .target
            .software()
            .unwrap()
            .read_pixels()
            .unwrap();
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(pixels.get_pixel(x, y), Some([0, 255, 0, 255]));
            }
        }
    }

    #[test]
    fn test_transform_with_blank_child_leaves_target_blank() {
        let registry = AlternativesRegistry::new();
        let mut graph = TaskGraph::new();
        // Child never executed: its surface stays blank.
        let leaf = graph.add(frame_node(
            &registry,
            TaskKind::Solid { color: Color::GREEN },
            8,
            vec![],
        ));
        let root = graph.add(frame_node(
            &registry,
            TaskKind::Transform { matrix: Mat23::identity() },
            8,
            vec![leaf],
        ));
        SoftwareBackend.execute(&graph, root, None).unwrap();
        assert!(graph.get(root).unwrap().target.is_blank());
    }

    #[test]
    fn test_import_places_pixels() {
        let registry = AlternativesRegistry::new();
        let mut graph = TaskGraph::new();
        let src = PixelBuffer::solid(8, 8, Color::BLUE).unwrap();
        let id = graph.add(frame_node(
            &registry,
            TaskKind::Import { pixels: Arc::new(src) },
            8,
            vec![],
        ));
        SoftwareBackend.execute(&graph, id, None).unwrap();
        let pixels = graph
            .get(id)
            .unwrap()
            .target
            .software()
            .unwrap()
            .read_pixels()
            .unwrap();
        assert_eq!(pixels.get_pixel(4, 4), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_blur_with_huge_radius_stays_uniform() {
        let registry = AlternativesRegistry::new();
        let mut graph = TaskGraph::new();
        let leaf = graph.add(frame_node(
            &registry,
            TaskKind::Solid { color: Color::GREEN },
            8,
            vec![],
        ));
        let root = graph.add(frame_node(
            &registry,
            TaskKind::Blur { kind: BlurKind::Box, radius: 5e9 },
            8,
            vec![leaf],
        ));
        SoftwareBackend.execute(&graph, leaf, None).unwrap();
        SoftwareBackend.execute(&graph, root, None).unwrap();
        // A uniform frame is a blur fixed point for any radius; an
        // unclamped radius used to collapse the window to nothing.
        let pixels = graph.get(root).unwrap().target.software().unwrap().read_pixels().unwrap();
        assert_eq!(pixels.get_pixel(0, 0), Some([0, 255, 0, 255]));
        assert_eq!(pixels.get_pixel(4, 4), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_budget_exhaustion_is_reported() {
        let registry = AlternativesRegistry::new();
        let mut graph = TaskGraph::new();
        let id = graph.add(frame_node(
            &registry,
            TaskKind::Solid { color: Color::RED },
            64,
            vec![],
        ));
        let err = SoftwareBackend.execute(&graph, id, Some(64)).unwrap_err();
        assert!(matches!(err, RenderError::Exhausted(_)));
        // The target is still blank and a retry without a budget works.
        assert!(graph.get(id).unwrap().target.is_blank());
        assert!(SoftwareBackend.execute(&graph, id, None).is_ok());
    }
}
