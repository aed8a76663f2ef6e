//! Engine configuration.

use crate::geometry::{DEFAULT_BEZIER_STEPS, DEFAULT_CIRCLE_STEPS, MIN_CIRCLE_STEPS};
use crate::snap::LINE_SNAP_THRESHOLD_DEG;
use crate::timing::BackwardNavigation;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("circleSteps must be at least {min}, got {got}")]
    TooFewCircleSteps { min: usize, got: usize },
    #[error("layer prefix must not be empty")]
    EmptyLayerPrefix,
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// How the compositor decides whether a category's data changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeDetection {
    /// Push data only when the feature count changes.
    FeatureCount,
    /// Push data when the serialized features differ.
    #[default]
    Fingerprint,
}

/// Tunables for drawing, rendering and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub circle_steps: usize,
    pub bezier_steps: usize,
    pub snap_threshold_deg: f64,
    pub snap_to_lines: bool,
    /// Color tween duration in milliseconds.
    pub transition_ms: u64,
    pub change_detection: ChangeDetection,
    pub backward_navigation: BackwardNavigation,
    /// Prefix for every map source and layer id this engine owns.
    pub layer_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            circle_steps: DEFAULT_CIRCLE_STEPS,
            bezier_steps: DEFAULT_BEZIER_STEPS,
            snap_threshold_deg: LINE_SNAP_THRESHOLD_DEG,
            snap_to_lines: true,
            transition_ms: 300,
            change_detection: ChangeDetection::default(),
            backward_navigation: BackwardNavigation::default(),
            layer_prefix: "chronoatlas".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse from JSON. Missing keys fall back to defaults.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.circle_steps < MIN_CIRCLE_STEPS {
            return Err(ConfigError::TooFewCircleSteps {
                min: MIN_CIRCLE_STEPS,
                got: self.circle_steps,
            });
        }
        if self.bezier_steps == 0 {
            return Err(ConfigError::NotPositive { field: "bezierSteps" });
        }
        if !(self.snap_threshold_deg > 0.0) {
            return Err(ConfigError::NotPositive { field: "snapThresholdDeg" });
        }
        if self.layer_prefix.is_empty() {
            return Err(ConfigError::EmptyLayerPrefix);
        }
        Ok(())
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }
}
