/// Core error types shared across the Lumira crates.
///
/// These are all recoverable at the render-request granularity; callers are
/// expected to propagate them with `?` rather than panic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("pixel storage allocation of {width}x{height} exceeds the budget of {budget} bytes")]
    AllocationBudget { width: u32, height: u32, budget: usize },

    #[error("pixel dimensions {width}x{height} overflow the addressable byte range")]
    DimensionOverflow { width: u32, height: u32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_error_display() {
        let err = CoreError::AllocationBudget { width: 64, height: 64, budget: 1024 };
        assert!(err.to_string().contains("64x64"));
        assert!(err.to_string().contains("1024"));
    }
}
