use lumira_core::CoreError;
use lumira_graph::{ConvertError, GraphError};

/// A specialized Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Failures surfaced by the renderer.
///
/// Structural errors indicate a defect in the authoring layer and always
/// fail the whole request. Conversion and exhaustion errors are
/// recovered at the nearest task boundary where a visual result is still
/// producible, and fail only the request otherwise.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    #[error("structural error: {0}")]
    Structural(#[from] GraphError),

    #[error("conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("resource exhaustion: {0}")]
    Exhausted(#[from] CoreError),

    #[error("render request cancelled")]
    Cancelled,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("configuration error: {0}")]
    Config(String),
}
