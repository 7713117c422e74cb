//! Evaluator configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use seqgra_core::CoreError;
use seqgra_explain::StrategyConfig;

use crate::agreement::DEFAULT_THRESHOLD;
use crate::error::Result;

/// Settings shared by every evaluator of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Max importance at which a position counts as important.
    pub relevance_threshold: f32,
    /// Whether to score agreement with the annotations.
    pub agreement: bool,
    /// Strategy parameters.
    pub strategy: StrategyConfig,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: DEFAULT_THRESHOLD,
            agreement: true,
            strategy: StrategyConfig::default(),
        }
    }
}

impl EvaluatorConfig {
    /// Set the relevance threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.relevance_threshold = threshold;
        self
    }

    /// Enable or disable agreement scoring.
    #[must_use]
    pub fn with_agreement(mut self, agreement: bool) -> Self {
        self.agreement = agreement;
        self
    }

    /// Set the strategy parameters.
    #[must_use]
    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    /// Check the relevance threshold is a finite number.
    ///
    /// # Errors
    ///
    /// [`CoreError::Configuration`] for a NaN or infinite threshold.
    pub fn validate(&self) -> Result<()> {
        if !self.relevance_threshold.is_finite() {
            return Err(CoreError::Configuration(format!(
                "relevance threshold must be finite, got {}",
                self.relevance_threshold
            ))
            .into());
        }
        Ok(())
    }

    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
