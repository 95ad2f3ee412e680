use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// How a freshly measured interval is matched against existing buckets.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BucketingMode {
    /// First bucket within `round(interval * bucket_tolerance_ratio)` samples wins.
    #[default]
    Tolerance,
    /// Only an identical normalized interval matches.
    Exact,
}

/// Tunables of the tempo engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EstimatorConfig {
    /// Samples per analysis window. Trailing samples that do not fill a window are ignored.
    pub window_size: usize,
    /// Minimum amplitude for a local maximum to count as a peak.
    pub peak_threshold: f32,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// How many following peaks each peak is paired with.
    pub max_lookahead: usize,
    pub bucket_tolerance_ratio: f64,
    pub bucketing: BucketingMode,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            window_size: 22_050,
            peak_threshold: 0.08,
            min_bpm: 70.0,
            max_bpm: 200.0,
            max_lookahead: 9,
            bucket_tolerance_ratio: 0.04,
            bucketing: BucketingMode::Tolerance,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.window_size < 3 {
            return Err(DomainError::validation(
                "window size must hold at least three samples",
            ));
        }
        if !self.peak_threshold.is_finite() || self.peak_threshold < 0.0 {
            return Err(DomainError::validation(
                "peak threshold must be a non-negative number",
            ));
        }
        if !self.min_bpm.is_finite() || self.min_bpm <= 0.0 {
            return Err(DomainError::validation("min bpm must be positive"));
        }
        if !self.max_bpm.is_finite() || self.max_bpm <= self.min_bpm {
            return Err(DomainError::validation(
                "max bpm must be greater than min bpm",
            ));
        }
        // Folding by powers of two only lands in the band if it spans an octave.
        if self.max_bpm < self.min_bpm * 2.0 {
            return Err(DomainError::validation(
                "tempo range must span at least one octave",
            ));
        }
        if self.max_lookahead == 0 {
            return Err(DomainError::validation("max lookahead must be at least 1"));
        }
        if !self.bucket_tolerance_ratio.is_finite() || self.bucket_tolerance_ratio < 0.0 {
            return Err(DomainError::validation(
                "bucket tolerance ratio must be a non-negative number",
            ));
        }
        Ok(())
    }
}

/// Limits applied by the caller around the engine, never by the engine itself.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    pub max_parallel_decode: usize,
    /// Extra decode attempts after the first failure.
    pub fetch_retry: u32,
    pub fetch_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel_decode: 2,
            fetch_retry: 2,
            fetch_backoff_ms: 300,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub estimator: EstimatorConfig,
    pub scheduler: SchedulerConfig,
}

impl Settings {
    pub fn from_yaml_str(input: &str) -> Result<Self, DomainError> {
        let settings: Self = serde_yaml::from_str(input)
            .map_err(|err| DomainError::Serialization(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_str(input: &str) -> Result<Self, DomainError> {
        let settings: Self = serde_json::from_str(input)
            .map_err(|err| DomainError::Serialization(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a `.json` file, or YAML for any other extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("read settings file {:?}", path_ref))?;
        let is_json = path_ref
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let settings = if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_str(&contents)
        };
        settings.with_context(|| format!("parse settings file {:?}", path_ref))
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.estimator.validate()?;
        if self.scheduler.max_parallel_decode == 0 {
            return Err(DomainError::validation(
                "max parallel decode must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuned_values() {
        let config = EstimatorConfig::default();
        assert_eq!(config.window_size, 22_050);
        assert_eq!(config.peak_threshold, 0.08);
        assert_eq!(config.max_lookahead, 9);
        assert_eq!(config.bucketing, BucketingMode::Tolerance);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation() {
        let narrow = EstimatorConfig {
            min_bpm: 100.0,
            max_bpm: 150.0,
            ..Default::default()
        };
        assert!(narrow.validate().is_err());
        let inverted = EstimatorConfig {
            min_bpm: 200.0,
            max_bpm: 70.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
        let tiny_window = EstimatorConfig {
            window_size: 2,
            ..Default::default()
        };
        assert!(tiny_window.validate().is_err());
    }

    #[test]
    fn yaml_overrides_only_given_fields() {
        let settings = Settings::from_yaml_str(
            "estimator:\n  peakThreshold: 0.1\n  bucketing: exact\nscheduler:\n  maxParallelDecode: 4\n",
        )
        .unwrap();
        assert_eq!(settings.estimator.peak_threshold, 0.1);
        assert_eq!(settings.estimator.bucketing, BucketingMode::Exact);
        assert_eq!(settings.estimator.window_size, 22_050);
        assert_eq!(settings.scheduler.max_parallel_decode, 4);
        assert_eq!(settings.scheduler.fetch_retry, 2);
    }

    #[test]
    fn json_settings_are_validated() {
        let result = Settings::from_json_str(r#"{"scheduler": {"maxParallelDecode": 0}}"#);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
