//! # lumira-graph
//!
//! The resource cache and rendering task graph beneath the Lumira layer
//! stack. Resources carry a process-unique identity and may share an
//! alternatives group — the set of resources known to represent the same
//! logical image in different concrete forms (uncompressed software
//! buffer, packed buffer). Alternatives are obtained lazily and exactly
//! once per representation type, safe under concurrent access.
//!
//! Tasks form an arena-backed DAG of drawing operations (composite,
//! blend, transform, blur, import); layers build the graph bottom-up and
//! the `lumira-render` crate schedules and executes it.

pub mod alternatives;
pub mod layer;
pub mod resource;
pub mod surface;
pub mod task;

pub use alternatives::{AlternativesRegistry, GroupHold, GroupId};
pub use layer::{compose_layers, BlurLayer, GroupLayer, Layer, SolidLayer, TaskContext, TransformLayer};
pub use resource::{ConvertError, ConvertFrom, Resource, ResourceData, ResourceId};
pub use surface::{PackedSurface, SoftwareSurface, Surface, SurfaceResource, SurfaceToken};
pub use task::{BlurKind, GraphError, TaskGraph, TaskId, TaskKind, TaskNode};
