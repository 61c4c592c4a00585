//! Parallel execution of deferred rendering task graphs.
//!
//! A [`Renderer`] takes a validated [`TaskGraph`](lumira_graph::TaskGraph),
//! folds redundant transform chains, partitions the reachable tasks into
//! dependency waves and runs each wave across a worker pool. Pixel
//! production is behind the [`Backend`] trait; the built-in
//! [`SoftwareBackend`] renders on the CPU.

pub mod backend;
pub mod blur;
pub mod config;
pub mod error;
pub mod optimize;
pub mod renderer;

pub use backend::{Backend, SoftwareBackend};
pub use config::RendererConfig;
pub use error::{RenderError, RenderResult};
pub use renderer::{CancelToken, RenderProgress, RenderState, Renderer};
