use super::Analyzer;
use crate::config::AnalyticsConfig;
use crate::series::DetectionSeries;
use crate::stats::{as_f64, mean, std_dev};
use serde::{Deserialize, Serialize};

const MODERATE_CV: f64 = 0.3;
const HIGH_CV: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    Increasing,
    Stable,
    Decreasing,
}

impl Trend {
    /// Stable inside the closed band `[-threshold, threshold]`
    pub fn from_rate(flow_rate: f64, threshold: f64) -> Self {
        if flow_rate > threshold {
            Trend::Increasing
        } else if flow_rate < -threshold {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variability {
    Low,
    Moderate,
    High,
}

impl Variability {
    pub fn from_cv(cv: f64) -> Self {
        if cv > HIGH_CV {
            Variability::High
        } else if cv >= MODERATE_CV {
            Variability::Moderate
        } else {
            Variability::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowMetrics {
    /// People per second between the first and last frame
    pub flow_rate: f64,
    #[serde(rename = "trend")]
    pub trend_label: Trend,
    pub average_count: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    #[serde(rename = "variability")]
    pub variability_label: Variability,
}

pub struct FlowMetricsCalculator {
    trend_threshold: f64,
}

impl FlowMetricsCalculator {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            trend_threshold: config.flow_trend_threshold,
        }
    }

    /// Net change in count over elapsed time; 0 when undefined
    fn flow_rate(series: &DetectionSeries) -> f64 {
        let frames = series.frames();
        let (Some(first), Some(last)) = (frames.first(), frames.last()) else {
            return 0.0;
        };
        let elapsed = last.timestamp_seconds - first.timestamp_seconds;
        if frames.len() < 2 || elapsed <= 0.0 {
            return 0.0;
        }
        (last.person_count() as f64 - first.person_count() as f64) / elapsed
    }
}

impl Analyzer for FlowMetricsCalculator {
    type Output = FlowMetrics;

    fn id(&self) -> &'static str {
        "flow_metrics_calculator"
    }

    fn analyze(&self, series: &DetectionSeries) -> FlowMetrics {
        let counts = as_f64(series.counts());
        let average_count = mean(&counts);
        let std_dev = std_dev(&counts);
        let coefficient_of_variation = if average_count > 0.0 {
            std_dev / average_count
        } else {
            0.0
        };
        let flow_rate = Self::flow_rate(series);

        FlowMetrics {
            flow_rate,
            trend_label: Trend::from_rate(flow_rate, self.trend_threshold),
            average_count,
            std_dev,
            coefficient_of_variation,
            variability_label: Variability::from_cv(coefficient_of_variation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::DetectionFrame;
    use common::detections::BoundingBox;

    fn series_at(samples: &[(f64, usize)]) -> DetectionSeries {
        let person = BoundingBox::new(0.0, 0.0, 30.0, 90.0, 0.7);
        DetectionSeries::from_frames(
            samples
                .iter()
                .enumerate()
                .map(|(i, &(t, c))| DetectionFrame::new(i as u64, t, vec![person; c])),
        )
    }

    fn calculator() -> FlowMetricsCalculator {
        FlowMetricsCalculator::new(&AnalyticsConfig::default())
    }

    #[test]
    fn test_flat_series_is_stable_and_low() {
        let samples: Vec<(f64, usize)> = (0..30).map(|i| (i as f64, 5)).collect();
        let flow = calculator().analyze(&series_at(&samples));

        assert_eq!(flow.flow_rate, 0.0);
        assert_eq!(flow.trend_label, Trend::Stable);
        assert_eq!(flow.average_count, 5.0);
        assert_eq!(flow.std_dev, 0.0);
        assert_eq!(flow.coefficient_of_variation, 0.0);
        assert_eq!(flow.variability_label, Variability::Low);
    }

    #[test]
    fn test_increasing_and_decreasing() {
        // +10 people over 20 seconds
        let flow = calculator().analyze(&series_at(&[(0.0, 2), (10.0, 6), (20.0, 12)]));
        assert_eq!(flow.flow_rate, 0.5);
        assert_eq!(flow.trend_label, Trend::Increasing);

        let flow = calculator().analyze(&series_at(&[(0.0, 12), (10.0, 6), (20.0, 2)]));
        assert_eq!(flow.flow_rate, -0.5);
        assert_eq!(flow.trend_label, Trend::Decreasing);
    }

    #[test]
    fn test_trend_band_is_closed() {
        assert_eq!(Trend::from_rate(0.1, 0.1), Trend::Stable);
        assert_eq!(Trend::from_rate(-0.1, 0.1), Trend::Stable);
        assert_eq!(Trend::from_rate(0.11, 0.1), Trend::Increasing);
        assert_eq!(Trend::from_rate(-0.11, 0.1), Trend::Decreasing);
    }

    #[test]
    fn test_variability_bands() {
        assert_eq!(Variability::from_cv(0.0), Variability::Low);
        assert_eq!(Variability::from_cv(0.29), Variability::Low);
        assert_eq!(Variability::from_cv(0.3), Variability::Moderate);
        assert_eq!(Variability::from_cv(0.5), Variability::Moderate);
        assert_eq!(Variability::from_cv(0.51), Variability::High);
    }

    #[test]
    fn test_high_variability() {
        // mean 5, population std ~4.06
        let flow = calculator().analyze(&series_at(&[(0.0, 1), (1.0, 10), (2.0, 1), (3.0, 8)]));
        assert_eq!(flow.average_count, 5.0);
        assert_eq!(flow.variability_label, Variability::High);
    }

    #[test]
    fn test_zero_mean_guards_cv() {
        let flow = calculator().analyze(&series_at(&[(0.0, 0), (1.0, 0), (2.0, 0)]));
        assert_eq!(flow.coefficient_of_variation, 0.0);
        assert_eq!(flow.variability_label, Variability::Low);
    }

    #[test]
    fn test_degenerate_series_is_stable() {
        let flow = calculator().analyze(&DetectionSeries::empty());
        assert_eq!(flow.flow_rate, 0.0);
        assert_eq!(flow.trend_label, Trend::Stable);

        let flow = calculator().analyze(&series_at(&[(4.0, 7)]));
        assert_eq!(flow.flow_rate, 0.0);
        assert_eq!(flow.trend_label, Trend::Stable);
    }

    #[test]
    fn test_labels_serialize_under_short_names() {
        let samples: Vec<(f64, usize)> = (0..5).map(|i| (i as f64, 3)).collect();
        let json = serde_json::to_value(calculator().analyze(&series_at(&samples))).unwrap();
        assert_eq!(json["trend"], "Stable");
        assert_eq!(json["variability"], "Low");
    }
}
