//! The aggregate analytics report.
//!
//! [`AnalyticsReport::assemble`] is a pure composition of the five
//! analyzers. The typed report becomes JSON only through
//! [`AnalyticsReport::to_json`] and friends.

use crate::analyzers::{
    Analyzer, BottleneckAnalysis, BottleneckDetector, CrowdDensity, DensityClassifier,
    FlowMetrics, FlowMetricsCalculator, SpatialDistribution, SpatialDistributionAnalyzer,
    VisualizationAggregator, VisualizationData,
};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::series::DetectionSeries;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub crowd_density: CrowdDensity,
    pub spatial_distribution: SpatialDistribution,
    pub bottleneck_analysis: BottleneckAnalysis,
    pub flow_metrics: FlowMetrics,
    pub visualization_data: VisualizationData,
    pub frames_analyzed: usize,
    pub frames_skipped: usize,
}

impl AnalyticsReport {
    /// Validate `config`, then run every analyzer over `series`.
    ///
    /// An empty series is not an error here; it produces the all-zero
    /// report. Callers that need frames use [`Self::ensure_not_empty`].
    pub fn assemble(series: &DetectionSeries, config: &AnalyticsConfig) -> Result<Self> {
        config.validate()?;

        let density = DensityClassifier::new(config)?;
        let spatial = SpatialDistributionAnalyzer::new(config);
        let bottleneck = BottleneckDetector::new(config);
        let flow = FlowMetricsCalculator::new(config);
        let visualization = VisualizationAggregator::new(config);

        let report = Self {
            crowd_density: run(&density, series),
            spatial_distribution: run(&spatial, series),
            bottleneck_analysis: run(&bottleneck, series),
            flow_metrics: run(&flow, series),
            visualization_data: run(&visualization, series),
            frames_analyzed: series.len(),
            frames_skipped: series.skipped().len(),
        };

        tracing::info!(
            frames_analyzed = report.frames_analyzed,
            frames_skipped = report.frames_skipped,
            density_level = %report.crowd_density.density_level,
            bottlenecks = report.bottleneck_analysis.bottlenecks_detected,
            pattern = %report.spatial_distribution.distribution_pattern,
            "analytics report assembled"
        );

        Ok(report)
    }

    pub fn is_empty(&self) -> bool {
        self.frames_analyzed == 0
    }

    /// Reject the degenerate report of an empty series
    pub fn ensure_not_empty(self) -> Result<Self> {
        if self.is_empty() {
            return Err(AnalyticsError::EmptySeries);
        }
        Ok(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

fn run<A: Analyzer>(analyzer: &A, series: &DetectionSeries) -> A::Output {
    let _span = tracing::debug_span!("analyzer", id = analyzer.id()).entered();
    analyzer.analyze(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::{DensityLevel, DistributionPattern, Trend, Variability};
    use crate::series::DetectionFrame;
    use common::detections::BoundingBox;

    fn sample_series() -> DetectionSeries {
        let counts = [3, 4, 4, 5, 12, 10, 13, 12, 5, 4, 3, 3];
        DetectionSeries::from_frames(counts.iter().enumerate().map(|(i, &c)| {
            let people = (0..c)
                .map(|k| {
                    let x = 100.0 + (k as f32 * 150.0) % 1700.0;
                    BoundingBox::centered_at(x, 540.0, 40.0, 120.0)
                })
                .collect();
            DetectionFrame::new(i as u64 * 15, i as f64 * 0.5, people)
        }))
    }

    #[test]
    fn test_assemble_runs_every_section() {
        let series = sample_series();
        let report = AnalyticsReport::assemble(&series, &AnalyticsConfig::default()).unwrap();

        assert_eq!(report.frames_analyzed, 12);
        assert_eq!(report.frames_skipped, 0);
        assert_eq!(report.crowd_density.person_count, 6.5);
        assert_eq!(report.crowd_density.density_level, DensityLevel::VeryLow);
        assert_eq!(
            report.spatial_distribution.total_detections_analyzed,
            series.total_detections()
        );
        assert_eq!(report.bottleneck_analysis.bottlenecks_detected, 1);
        assert_eq!(report.visualization_data.summary.total_samples, 12);
        assert_eq!(report.visualization_data.total_intervals, 1);
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let series = sample_series();
        let config = AnalyticsConfig::default();

        let a = AnalyticsReport::assemble(&series, &config).unwrap();
        let b = AnalyticsReport::assemble(&series, &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn test_invalid_configuration_fails_fast() {
        let config = AnalyticsConfig {
            area_sqm: 0.0,
            ..Default::default()
        };
        let err = AnalyticsReport::assemble(&sample_series(), &config).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidConfiguration(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_empty_series_yields_zero_report() {
        let report =
            AnalyticsReport::assemble(&DetectionSeries::empty(), &AnalyticsConfig::default())
                .unwrap();

        assert!(report.is_empty());
        assert_eq!(report.crowd_density.density_per_sqm, 0.0);
        assert_eq!(report.spatial_distribution.total_detections_analyzed, 0);
        assert_eq!(
            report.spatial_distribution.distribution_pattern,
            DistributionPattern::Even
        );
        assert_eq!(report.bottleneck_analysis.bottlenecks_detected, 0);
        assert_eq!(report.flow_metrics.trend_label, Trend::Stable);
        assert_eq!(report.flow_metrics.variability_label, Variability::Low);
        assert!(report.visualization_data.chart_data.is_empty());

        assert_eq!(report.ensure_not_empty(), Err(AnalyticsError::EmptySeries));
    }

    #[test]
    fn test_top_level_json_shape() {
        let report = AnalyticsReport::assemble(&sample_series(), &AnalyticsConfig::default())
            .unwrap()
            .to_value()
            .unwrap();

        for key in [
            "crowd_density",
            "spatial_distribution",
            "bottleneck_analysis",
            "flow_metrics",
            "visualization_data",
            "frames_analyzed",
            "frames_skipped",
        ] {
            assert!(report.get(key).is_some(), "missing {}", key);
        }
        assert!(report["spatial_distribution"]["zones"][4]["percentage"].is_number());
        assert!(report["bottleneck_analysis"]["bottleneck_periods"][0]["severity"].is_string());
    }
}
