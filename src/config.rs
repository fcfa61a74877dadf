//! Compiler configuration.
//!
//! Loaded from YAML; every field has a default so an empty file is valid.

use crate::compiler::CompilePhase;
use crate::errors::WarningCategory;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfiguration {
    /// Last phase to run.
    pub target_phase: CompilePhase,
    /// Directories scanned for global transformation service files.
    pub classpath: Vec<PathBuf>,
    /// Global transformation class names to ignore.
    pub disabled_global_transforms: Vec<String>,
    /// 0 none, 1 likely errors, 2 possible errors, 3 paranoia.
    pub warning_level: u8,
    /// Call depth limit for the reference evaluator.
    pub max_eval_depth: usize,
}

impl Default for CompilerConfiguration {
    fn default() -> Self {
        Self {
            target_phase: CompilePhase::Finalization,
            classpath: Vec::new(),
            disabled_global_transforms: Vec::new(),
            warning_level: 1,
            max_eval_depth: 512,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl CompilerConfiguration {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn warning_category(&self) -> WarningCategory {
        WarningCategory::from_level(self.warning_level)
    }

    pub fn is_global_disabled(&self, name: &str) -> bool {
        self.disabled_global_transforms.iter().any(|d| d == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = CompilerConfiguration::from_yaml("").unwrap();
        assert_eq!(config, CompilerConfiguration::default());
        assert_eq!(config.warning_category(), WarningCategory::LikelyErrors);
    }

    #[test]
    fn partial_yaml_overrides_fields() {
        let config = CompilerConfiguration::from_yaml(
            "target_phase: CANONICALIZATION\nwarning_level: 2\ndisabled_global_transforms: [a.B]\n",
        )
        .unwrap();
        assert_eq!(config.target_phase, CompilePhase::Canonicalization);
        assert_eq!(config.warning_category(), WarningCategory::PossibleErrors);
        assert!(config.is_global_disabled("a.B"));
        assert!(config.classpath.is_empty());
    }

    #[test]
    fn unknown_phase_is_rejected() {
        assert!(CompilerConfiguration::from_yaml("target_phase: LINKING").is_err());
    }
}
