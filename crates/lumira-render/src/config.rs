use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Worker threads for parallel subtree execution. 0 picks the rayon
    /// default (one per logical CPU).
    pub threads: usize,
    /// Upper bound in bytes for any single surface allocation. `None`
    /// disables the budget.
    pub surface_budget: Option<usize>,
    /// Execution backend. Only "software" ships today.
    pub backend: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            surface_budget: None,
            backend: "software".to_string(),
        }
    }
}

impl RendererConfig {
    pub fn from_json(json: &str) -> RenderResult<Self> {
        serde_json::from_str(json).map_err(|e| RenderError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = RendererConfig::default();
        assert_eq!(cfg.threads, 0);
        assert_eq!(cfg.surface_budget, None);
        assert_eq!(cfg.backend, "software");
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = RendererConfig::from_json(r#"{"threads": 2, "surface_budget": 1048576}"#).unwrap();
        assert_eq!(cfg.threads, 2);
        assert_eq!(cfg.surface_budget, Some(1048576));
        assert_eq!(cfg.backend, "software");
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(RendererConfig::from_json("{threads").is_err());
    }
}
