use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracking::domain::stability_filter::SmoothingPolicy;

use super::constants::{
    DEFAULT_ADAPTER_TIMEOUT_MS, DEFAULT_AGE_OFFSET, DEFAULT_GENDER_OVERRIDE_CONFIDENCE,
    DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_MISSED, DEFAULT_MIN_IOU, MAX_HISTORY_CAPACITY,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// What a submission does when the face analyzer reports it is unavailable
/// or rejected the image. Timeouts always fail the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterFailurePolicy {
    #[default]
    Propagate,
    TreatAsEmpty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Years subtracted from every raw age estimate.
    pub age_offset: f64,
    /// Age observations kept per track.
    pub history_capacity: usize,
    /// Consecutive unmatched submissions a track survives.
    pub max_missed: u32,
    /// Minimum IoU for a detection to continue an existing track.
    pub min_iou: f64,
    /// Confidence a conflicting observation must exceed to replace a
    /// track's gender.
    pub gender_override_confidence: f64,
    pub smoothing: SmoothingPolicy,
    pub adapter_failure_policy: AdapterFailurePolicy,
    pub adapter_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            age_offset: DEFAULT_AGE_OFFSET,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_missed: DEFAULT_MAX_MISSED,
            min_iou: DEFAULT_MIN_IOU,
            gender_override_confidence: DEFAULT_GENDER_OVERRIDE_CONFIDENCE,
            smoothing: SmoothingPolicy::default(),
            adapter_failure_policy: AdapterFailurePolicy::default(),
            adapter_timeout_ms: DEFAULT_ADAPTER_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file; absent fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: EngineConfig =
            serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.age_offset.is_finite() || self.age_offset < 0.0 {
            return Err(ConfigError::invalid(
                "age_offset",
                format!("must be a non-negative number, got {}", self.age_offset),
            ));
        }
        if !(1..=MAX_HISTORY_CAPACITY).contains(&self.history_capacity) {
            return Err(ConfigError::invalid(
                "history_capacity",
                format!(
                    "must be between 1 and {MAX_HISTORY_CAPACITY}, got {}",
                    self.history_capacity
                ),
            ));
        }
        if !(self.min_iou > 0.0 && self.min_iou <= 1.0) {
            return Err(ConfigError::invalid(
                "min_iou",
                format!("must be in (0.0, 1.0], got {}", self.min_iou),
            ));
        }
        if !(0.0..=1.0).contains(&self.gender_override_confidence) {
            return Err(ConfigError::invalid(
                "gender_override_confidence",
                format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.gender_override_confidence
                ),
            ));
        }
        if self.adapter_timeout_ms == 0 {
            return Err(ConfigError::invalid("adapter_timeout_ms", "must be at least 1"));
        }
        Ok(())
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }
}
