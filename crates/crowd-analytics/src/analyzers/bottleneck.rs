//! Congestion detection.
//!
//! A frame is congested when its person count reaches
//! `mean(count) × bottleneck_threshold_multiplier`. Runs of consecutive
//! congested frames at least `min_bottleneck_duration` long become
//! [`BottleneckPeriod`]s, each scored 0-100 for severity.

use super::Analyzer;
use crate::config::AnalyticsConfig;
use crate::series::{DetectionFrame, DetectionSeries};
use crate::stats::{as_f64, format_time, mean, round_to};
use serde::{Deserialize, Serialize};

const DURATION_WEIGHT: f64 = 0.40;
const PEAK_WEIGHT: f64 = 0.35;
const AVERAGE_WEIGHT: f64 = 0.25;

/// A run this many times the minimum length scores full marks on duration
const DURATION_SATURATION: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeverityLabel {
    Low,
    Moderate,
    High,
    Critical,
}

impl SeverityLabel {
    /// [0, 40) Low, [40, 60) Moderate, [60, 80] High, above 80 Critical
    pub fn from_score(score: f64) -> Self {
        if score > 80.0 {
            SeverityLabel::Critical
        } else if score >= 60.0 {
            SeverityLabel::High
        } else if score >= 40.0 {
            SeverityLabel::Moderate
        } else {
            SeverityLabel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLabel::Low => "Low",
            SeverityLabel::Moderate => "Moderate",
            SeverityLabel::High => "High",
            SeverityLabel::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for SeverityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BottleneckPeriod {
    pub start_frame: u64,
    pub end_frame: u64,
    pub start_time: f64,
    pub end_time: f64,
    pub start_time_formatted: String,
    pub end_time_formatted: String,
    pub duration_seconds: f64,
    /// Number of frames in the run
    pub frame_count: usize,
    pub peak_count: usize,
    pub avg_count: f64,
    pub severity_score: f64,
    #[serde(rename = "severity")]
    pub severity_label: SeverityLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BottleneckAnalysis {
    pub bottlenecks_detected: usize,
    /// Sorted by start time, never overlapping
    pub bottleneck_periods: Vec<BottleneckPeriod>,
    pub total_bottleneck_duration_seconds: f64,
    pub threshold_used: f64,
    pub average_person_count: f64,
    pub max_person_count: usize,
}

impl BottleneckAnalysis {
    fn none(threshold_used: f64, average_person_count: f64, max_person_count: usize) -> Self {
        Self {
            bottlenecks_detected: 0,
            bottleneck_periods: Vec::new(),
            total_bottleneck_duration_seconds: 0.0,
            threshold_used,
            average_person_count,
            max_person_count,
        }
    }
}

pub struct BottleneckDetector {
    threshold_multiplier: f64,
    min_duration_frames: usize,
}

impl BottleneckDetector {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            threshold_multiplier: config.bottleneck_threshold_multiplier,
            min_duration_frames: config.min_bottleneck_duration,
        }
    }

    /// Composite 0-100 score, rounded to one decimal.
    ///
    /// Weighted sum of normalized run length (40%), peak excess over the
    /// threshold (35%) and average excess over the threshold (25%). Each
    /// term is clamped to [0, 1]; an excess of 100% saturates.
    pub fn severity_score(&self, frame_count: usize, peak: f64, avg: f64, threshold: f64) -> f64 {
        let saturation = DURATION_SATURATION * self.min_duration_frames.max(1) as f64;
        let duration = (frame_count as f64 / saturation).min(1.0);
        let (peak_excess, avg_excess) = if threshold > 0.0 {
            (
                (peak / threshold - 1.0).clamp(0.0, 1.0),
                (avg / threshold - 1.0).clamp(0.0, 1.0),
            )
        } else {
            (0.0, 0.0)
        };

        let score = 100.0
            * (DURATION_WEIGHT * duration + PEAK_WEIGHT * peak_excess + AVERAGE_WEIGHT * avg_excess);
        round_to(score, 1)
    }

    fn period_for(&self, run: &[DetectionFrame], threshold: f64) -> Option<BottleneckPeriod> {
        let (first, last) = (run.first()?, run.last()?);
        let counts = as_f64(run.iter().map(DetectionFrame::person_count));
        let peak_count = run.iter().map(DetectionFrame::person_count).max().unwrap_or(0);
        let avg_count = mean(&counts);
        let severity_score = self.severity_score(run.len(), peak_count as f64, avg_count, threshold);

        Some(BottleneckPeriod {
            start_frame: first.frame_index,
            end_frame: last.frame_index,
            start_time: first.timestamp_seconds,
            end_time: last.timestamp_seconds,
            start_time_formatted: format_time(first.timestamp_seconds),
            end_time_formatted: format_time(last.timestamp_seconds),
            duration_seconds: last.timestamp_seconds - first.timestamp_seconds,
            frame_count: run.len(),
            peak_count,
            avg_count,
            severity_score,
            severity_label: SeverityLabel::from_score(severity_score),
        })
    }

    fn close_run(
        &self,
        run: &[DetectionFrame],
        threshold: f64,
        periods: &mut Vec<BottleneckPeriod>,
    ) {
        if run.len() < self.min_duration_frames {
            tracing::trace!(
                frames = run.len(),
                min_frames = self.min_duration_frames,
                "congested run shorter than minimum, ignoring"
            );
            return;
        }
        if let Some(period) = self.period_for(run, threshold) {
            periods.push(period);
        }
    }
}

impl Analyzer for BottleneckDetector {
    type Output = BottleneckAnalysis;

    fn id(&self) -> &'static str {
        "bottleneck_detector"
    }

    fn analyze(&self, series: &DetectionSeries) -> BottleneckAnalysis {
        let frames = series.frames();
        let avg_all = mean(&as_f64(series.counts()));
        let max_count = series.counts().max().unwrap_or(0);
        let threshold = avg_all * self.threshold_multiplier;

        // With nobody in frame, every frame would meet a zero threshold
        if avg_all <= 0.0 {
            return BottleneckAnalysis::none(threshold, avg_all, max_count);
        }

        let mut periods = Vec::new();
        let mut run_start: Option<usize> = None;
        for (i, frame) in frames.iter().enumerate() {
            if frame.person_count() as f64 >= threshold {
                run_start.get_or_insert(i);
            } else if let Some(start) = run_start.take() {
                self.close_run(&frames[start..i], threshold, &mut periods);
            }
        }
        if let Some(start) = run_start {
            self.close_run(&frames[start..], threshold, &mut periods);
        }

        let total_duration: f64 = periods.iter().map(|p| p.duration_seconds).sum();

        tracing::debug!(
            threshold,
            bottlenecks = periods.len(),
            total_duration_seconds = total_duration,
            "bottleneck scan complete"
        );

        BottleneckAnalysis {
            bottlenecks_detected: periods.len(),
            bottleneck_periods: periods,
            total_bottleneck_duration_seconds: total_duration,
            threshold_used: threshold,
            average_person_count: avg_all,
            max_person_count: max_count,
        }
    }
}
