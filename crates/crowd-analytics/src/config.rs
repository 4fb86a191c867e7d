use crate::error::{AnalyticsError, Result};
use common::validation::{
    validate_ascending, validate_finite, validate_positive, validate_range,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

/// Immutable analysis settings passed into every analyzer.
///
/// Deserializes with per-field defaults, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Monitored floor area in square meters (density denominator)
    #[serde(default = "default_area_sqm")]
    pub area_sqm: f64,

    /// Lower bound of each density tier in people/m², Very Low first
    #[serde(default = "default_density_thresholds")]
    pub density_thresholds: [f64; 5],

    /// Congestion threshold as a multiple of the series mean count
    #[serde(default = "default_bottleneck_multiplier")]
    pub bottleneck_threshold_multiplier: f64,

    /// Shortest congested run, in frames, reported as a bottleneck
    #[serde(default = "default_min_bottleneck_duration")]
    pub min_bottleneck_duration: usize,

    /// Zone share (percent) above which a zone is a hotspot
    #[serde(default = "default_hotspot_threshold")]
    pub hotspot_percentage_threshold: f64,

    /// Width of the chart buckets in seconds
    #[serde(default = "default_visualization_interval")]
    pub visualization_interval_seconds: f64,

    /// Symmetric flow-rate cutoff (people/s) between Stable and a trend
    #[serde(default = "default_flow_trend_threshold", alias = "flow_trend_thresholds")]
    pub flow_trend_threshold: f64,

    /// How many of the busiest frames the report lists
    #[serde(default = "default_peak_frame_count")]
    pub peak_frame_count: usize,

    /// Frame width in pixels, defines the zone grid
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,

    /// Frame height in pixels, defines the zone grid
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
}

fn default_area_sqm() -> f64 {
    100.0
}

fn default_density_thresholds() -> [f64; 5] {
    [0.0, 0.1, 0.2, 0.3, 0.5]
}

fn default_bottleneck_multiplier() -> f64 {
    1.5
}

fn default_min_bottleneck_duration() -> usize {
    3
}

fn default_hotspot_threshold() -> f64 {
    15.0
}

fn default_visualization_interval() -> f64 {
    10.0
}

fn default_flow_trend_threshold() -> f64 {
    0.1
}

fn default_peak_frame_count() -> usize {
    5
}

fn default_frame_width() -> u32 {
    1920
}

fn default_frame_height() -> u32 {
    1080
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            area_sqm: default_area_sqm(),
            density_thresholds: default_density_thresholds(),
            bottleneck_threshold_multiplier: default_bottleneck_multiplier(),
            min_bottleneck_duration: default_min_bottleneck_duration(),
            hotspot_percentage_threshold: default_hotspot_threshold(),
            visualization_interval_seconds: default_visualization_interval(),
            flow_trend_threshold: default_flow_trend_threshold(),
            peak_frame_count: default_peak_frame_count(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
        }
    }
}

impl AnalyticsConfig {
    /// Parse and validate a JSON configuration object (`null` means defaults)
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let config: Self = if value.is_null() {
            Self::default()
        } else {
            serde_json::from_value(value)
                .map_err(|e| AnalyticsError::invalid_configuration(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AnalyticsError::invalid_configuration(format!(
                "cannot read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            AnalyticsError::invalid_configuration(format!(
                "config file {} is not valid JSON: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(value)
    }

    /// Apply `CROWD_*` environment overrides, then re-validate
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_override("CROWD_AREA_SQM")? {
            self.area_sqm = v;
        }
        if let Some(v) = env_override("CROWD_BOTTLENECK_MULTIPLIER")? {
            self.bottleneck_threshold_multiplier = v;
        }
        if let Some(v) = env_override("CROWD_MIN_BOTTLENECK_FRAMES")? {
            self.min_bottleneck_duration = v;
        }
        if let Some(v) = env_override("CROWD_HOTSPOT_THRESHOLD")? {
            self.hotspot_percentage_threshold = v;
        }
        if let Some(v) = env_override("CROWD_VIZ_INTERVAL_SECONDS")? {
            self.visualization_interval_seconds = v;
        }
        if let Some(v) = env_override("CROWD_FLOW_TREND_THRESHOLD")? {
            self.flow_trend_threshold = v;
        }
        if let Some(v) = env_override("CROWD_PEAK_FRAMES")? {
            self.peak_frame_count = v;
        }
        if let Some(v) = env_override("CROWD_FRAME_WIDTH")? {
            self.frame_width = v;
        }
        if let Some(v) = env_override("CROWD_FRAME_HEIGHT")? {
            self.frame_height = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Copy with the zone grid sized to a specific video
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_width = width;
        self.frame_height = height;
        self
    }

    /// Check every option; the first violation is returned
    pub fn validate(&self) -> Result<()> {
        validate_positive(self.area_sqm, "area_sqm")?;
        validate_ascending(&self.density_thresholds, "density_thresholds")?;
        validate_positive(
            self.bottleneck_threshold_multiplier,
            "bottleneck_threshold_multiplier",
        )?;
        validate_range(
            self.min_bottleneck_duration,
            1,
            usize::MAX,
            "min_bottleneck_duration",
        )?;
        validate_range(
            self.hotspot_percentage_threshold,
            0.0,
            100.0,
            "hotspot_percentage_threshold",
        )?;
        validate_positive(
            self.visualization_interval_seconds,
            "visualization_interval_seconds",
        )?;
        validate_finite(self.flow_trend_threshold, "flow_trend_threshold")?;
        if self.flow_trend_threshold < 0.0 {
            return Err(AnalyticsError::invalid_configuration(format!(
                "flow_trend_threshold must not be negative, got {}",
                self.flow_trend_threshold
            )));
        }
        validate_range(self.frame_width, 1, u32::MAX, "frame_width")?;
        validate_range(self.frame_height, 1, u32::MAX, "frame_height")?;
        Ok(())
    }
}

fn env_override<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            AnalyticsError::invalid_configuration(format!("{} has an invalid value: {:?}", name, raw))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.area_sqm, 100.0);
        assert_eq!(config.density_thresholds, [0.0, 0.1, 0.2, 0.3, 0.5]);
        assert_eq!(config.bottleneck_threshold_multiplier, 1.5);
        assert_eq!(config.min_bottleneck_duration, 3);
        assert_eq!(config.hotspot_percentage_threshold, 15.0);
        assert_eq!(config.visualization_interval_seconds, 10.0);
        assert_eq!(config.flow_trend_threshold, 0.1);
        assert_eq!(config.peak_frame_count, 5);
        assert_eq!((config.frame_width, config.frame_height), (1920, 1080));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = AnalyticsConfig::from_json(serde_json::json!({})).unwrap();
        assert_eq!(config, AnalyticsConfig::default());

        let config = AnalyticsConfig::from_json(serde_json::Value::Null).unwrap();
        assert_eq!(config, AnalyticsConfig::default());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = AnalyticsConfig::from_json(serde_json::json!({
            "area_sqm": 250.0,
            "min_bottleneck_duration": 5,
            "flow_trend_thresholds": 0.25,
            "peak_frame_count": 3
        }))
        .unwrap();

        assert_eq!(config.peak_frame_count, 3);

        assert_eq!(config.area_sqm, 250.0);
        assert_eq!(config.min_bottleneck_duration, 5);
        assert_eq!(config.flow_trend_threshold, 0.25);
        assert_eq!(config.bottleneck_threshold_multiplier, 1.5);
    }

    #[test]
    fn test_zero_area_is_rejected() {
        let err = AnalyticsConfig::from_json(serde_json::json!({"area_sqm": 0.0})).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("area_sqm"));
    }

    #[test]
    fn test_malformed_thresholds_are_rejected() {
        // Wrong arity
        let err = AnalyticsConfig::from_json(serde_json::json!({
            "density_thresholds": [0.0, 0.1, 0.2]
        }))
        .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidConfiguration(_)));

        // Unsorted
        let err = AnalyticsConfig::from_json(serde_json::json!({
            "density_thresholds": [0.0, 0.3, 0.2, 0.4, 0.5]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("strictly ascending"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_options() {
        let cases = [
            AnalyticsConfig {
                bottleneck_threshold_multiplier: 0.0,
                ..Default::default()
            },
            AnalyticsConfig {
                min_bottleneck_duration: 0,
                ..Default::default()
            },
            AnalyticsConfig {
                hotspot_percentage_threshold: 120.0,
                ..Default::default()
            },
            AnalyticsConfig {
                visualization_interval_seconds: -10.0,
                ..Default::default()
            },
            AnalyticsConfig {
                flow_trend_threshold: -0.1,
                ..Default::default()
            },
            AnalyticsConfig {
                frame_width: 0,
                ..Default::default()
            },
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(AnalyticsError::InvalidConfiguration(_))),
                "expected rejection for {:?}",
                config
            );
        }
    }

    #[test]
    fn test_with_frame_size() {
        let config = AnalyticsConfig::default().with_frame_size(640, 480);
        assert_eq!(config.frame_width, 640);
        assert_eq!(config.frame_height, 480);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analytics.json");
        std::fs::write(&path, r#"{"hotspot_percentage_threshold": 20.0}"#).unwrap();

        let config = AnalyticsConfig::from_file(&path).unwrap();
        assert_eq!(config.hotspot_percentage_threshold, 20.0);

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            AnalyticsConfig::from_file(&missing),
            Err(AnalyticsError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("CROWD_MIN_BOTTLENECK_FRAMES", "4");
        let config = AnalyticsConfig::default().with_env_overrides().unwrap();
        assert_eq!(config.min_bottleneck_duration, 4);

        std::env::set_var("CROWD_MIN_BOTTLENECK_FRAMES", "four");
        let err = AnalyticsConfig::default().with_env_overrides().unwrap_err();
        assert!(err.to_string().contains("CROWD_MIN_BOTTLENECK_FRAMES"));

        // Cleanup
        std::env::remove_var("CROWD_MIN_BOTTLENECK_FRAMES");
    }
}
