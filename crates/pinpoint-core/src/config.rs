//! Configuration types for pinpoint.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{DetectionMethod, Error};

/// Top-level configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PinpointConfig {
    /// Input sampling and scheduling
    pub interaction: InteractionSettings,
    /// Tactile feedback on touch devices
    pub haptics: HapticSettings,
    /// Detection chain settings
    pub detection: DetectionSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl PinpointConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: PinpointConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        self.interaction.validate()?;
        self.detection.validate()?;
        Ok(())
    }
}

/// Input sampling and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    /// Minimum spacing between pointer-move samples (16 ms ≈ 60/s)
    pub pointer_sample_interval_ms: u64,
    /// Quiet period that collapses touch-move bursts
    pub touch_debounce_ms: u64,
    /// Drag distance from the touch origin before re-evaluating
    pub drag_threshold_px: f64,
    /// Timeout ceiling for the first idle-time detection request
    pub idle_timeout_ms: u64,
    /// Timeout ceiling for the single idle-time retry
    pub idle_retry_timeout_ms: u64,
    /// Idle slack needed to run hover detection without a timeout
    pub min_idle_slack_ms: u64,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            pointer_sample_interval_ms: 16,
            touch_debounce_ms: 50,
            drag_threshold_px: 10.0,
            idle_timeout_ms: 100,
            idle_retry_timeout_ms: 50,
            min_idle_slack_ms: 1,
        }
    }
}

impl InteractionSettings {
    fn validate(&self) -> crate::Result<()> {
        if self.pointer_sample_interval_ms == 0 {
            return Err(Error::Config(
                "interaction.pointer_sample_interval_ms must be > 0".to_string(),
            ));
        }
        if self.touch_debounce_ms == 0 {
            return Err(Error::Config(
                "interaction.touch_debounce_ms must be > 0".to_string(),
            ));
        }
        if !self.drag_threshold_px.is_finite() || self.drag_threshold_px < 0.0 {
            return Err(Error::Config(
                "interaction.drag_threshold_px must be a non-negative number".to_string(),
            ));
        }
        if self.idle_timeout_ms == 0 || self.idle_retry_timeout_ms == 0 {
            return Err(Error::Config(
                "interaction idle timeouts must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tactile feedback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticSettings {
    /// Emit pulses at all
    pub enabled: bool,
    /// Pulse on touch start
    pub acknowledge_ms: u32,
    /// Pulse when the touched element changes during a drag
    pub tick_ms: u32,
    /// Vibration pattern when a touch selection commits
    pub confirm_pattern_ms: Vec<u32>,
}

impl Default for HapticSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            acknowledge_ms: 10,
            tick_ms: 5,
            confirm_pattern_ms: vec![15, 10, 15],
        }
    }
}

/// Detection chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Enabled strategies. Order is always canonical; fallback is always on.
    pub strategies: Vec<DetectionMethod>,
    /// Heuristic strategy settings
    pub heuristic: HeuristicSettings,
    /// Tree-walk strategy settings
    pub tree_walk: TreeWalkSettings,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            strategies: DetectionMethod::ALL.to_vec(),
            heuristic: HeuristicSettings::default(),
            tree_walk: TreeWalkSettings::default(),
        }
    }
}

impl DetectionSettings {
    /// Whether a strategy is enabled.
    pub fn is_enabled(&self, method: DetectionMethod) -> bool {
        method == DetectionMethod::Fallback || self.strategies.contains(&method)
    }

    fn validate(&self) -> crate::Result<()> {
        for (i, method) in self.strategies.iter().enumerate() {
            if self.strategies[..i].contains(method) {
                return Err(Error::Config(format!(
                    "detection.strategies lists '{method}' twice"
                )));
            }
        }

        for pattern in &self.heuristic.class_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                Error::Config(format!("Invalid class pattern '{pattern}': {e}"))
            })?;
        }

        if self.tree_walk.max_depth == 0 {
            return Err(Error::Config(
                "detection.tree_walk.max_depth must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Heuristic strategy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicSettings {
    /// How many ancestors above the target to inspect
    pub max_ancestor_depth: usize,
    /// Attributes that carry an explicit component name
    pub name_attributes: Vec<String>,
    /// Test-id attributes, humanized into a component name
    pub test_id_attributes: Vec<String>,
    /// Extra class-name patterns; capture group `name` (or 1) is the component
    pub class_patterns: Vec<String>,
}

impl Default for HeuristicSettings {
    fn default() -> Self {
        Self {
            max_ancestor_depth: 8,
            name_attributes: vec![
                "data-component".to_string(),
                "data-component-name".to_string(),
            ],
            test_id_attributes: vec![
                "data-testid".to_string(),
                "data-test-id".to_string(),
                "data-test".to_string(),
                "data-cy".to_string(),
            ],
            class_patterns: vec![],
        }
    }
}

/// Tree-walk strategy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeWalkSettings {
    /// Maximum number of render nodes to visit
    pub max_depth: usize,
    /// Library-internal component names that never qualify
    pub ignored_names: Vec<String>,
}

impl Default for TreeWalkSettings {
    fn default() -> Self {
        Self {
            max_depth: 64,
            ignored_names: vec![
                "Fragment".to_string(),
                "Suspense".to_string(),
                "StrictMode".to_string(),
                "Profiler".to_string(),
                "ErrorBoundary".to_string(),
            ],
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
