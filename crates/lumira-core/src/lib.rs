//! # lumira-core
//!
//! Foundational value types for the Lumira render core: colors, affine
//! transforms, rectangles, blend modes, pixel buffers, and error types.
//! Everything here is plain data; the resource cache and task graph live
//! in `lumira-graph`, scheduling and execution in `lumira-render`.

pub mod blend;
pub mod color;
pub mod error;
pub mod math;
pub mod pixel;

pub use blend::BlendMode;
pub use color::Color;
pub use error::{CoreError, CoreResult};
pub use math::{Mat23, Rect, RectI, Vec2};
pub use pixel::PixelBuffer;
