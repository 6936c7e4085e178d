use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{SearchLimits, Strategy};

/// Solver settings, loadable from a JSON file. Missing fields take their
/// defaults: exact search with no limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    pub strategy: Strategy,
    /// Maximum search nodes before the exact packer settles.
    pub node_budget: Option<u64>,
    /// Wall-clock limit for the exact packer, in milliseconds.
    pub time_limit_ms: Option<u64>,
}

impl SolverConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config '{}': {}", path.display(), e))?;
        Self::from_json(&text).map_err(|e| format!("invalid config '{}': {}", path.display(), e))
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            node_budget: self.node_budget,
            time_limit: self.time_limit_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = SolverConfig::from_json("{}").unwrap();
        assert_eq!(config, SolverConfig::default());
        assert_eq!(config.strategy, Strategy::Exact);
        assert_eq!(config.limits(), SearchLimits::unbounded());
    }

    #[test]
    fn test_full_config() {
        let config = SolverConfig::from_json(
            r#"{"strategy": "greedy", "node_budget": 5000, "time_limit_ms": 250}"#,
        )
        .unwrap();
        assert_eq!(config.strategy, Strategy::Greedy);
        assert_eq!(
            config.limits(),
            SearchLimits::unbounded()
                .with_node_budget(5000)
                .with_time_limit(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(SolverConfig::from_json(r#"{"kerf": 3}"#).is_err());
        assert!(SolverConfig::from_json(r#"{"strategy": "genetic"}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = SolverConfig::from_file(Path::new("/nonexistent/solver.json")).unwrap_err();
        assert!(err.starts_with("cannot read config"));
    }
}
