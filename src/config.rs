//! Pipeline configuration
//!
//! Defaults reproduce the rating tool: an 80/20 split and a 200-tree forest,
//! both seeded with 0. Any field can be overridden from a TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RaterError, Result};

/// How many candidate features a tree examines at each node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Every feature, visited in random order
    #[default]
    All,
    Sqrt,
    Log2,
    /// Fraction of the feature count, in (0, 1]
    Fraction(f64),
}

impl MaxFeatures {
    /// Number of features to examine out of `n_features` (at least one).
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => n.sqrt() as usize,
            MaxFeatures::Log2 => n.log2() as usize,
            MaxFeatures::Fraction(f) => (f * n) as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Random forest settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_features: MaxFeatures,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// `None` grows each tree until its leaves are pure
    pub max_depth: Option<usize>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_features: MaxFeatures::All,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_depth: None,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(RaterError::InvalidConfig(
                "forest.n_estimators must be at least 1".into(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(RaterError::InvalidConfig(
                "forest.min_samples_split must be at least 2".into(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(RaterError::InvalidConfig(
                "forest.min_samples_leaf must be at least 1".into(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(RaterError::InvalidConfig(
                "forest.max_depth must be at least 1 when set".into(),
            ));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(RaterError::InvalidConfig(format!(
                    "forest.max_features fraction must be in (0, 1], got {f}"
                )));
            }
        }
        Ok(())
    }
}

/// Top-level settings for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Share of rows held out for scoring
    pub test_size: f64,
    /// Seed for both the split and the forest
    pub seed: u64,
    pub forest: ForestConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 0,
            forest: ForestConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(RaterError::InvalidConfig(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        self.forest.validate()
    }
}
