/// Fixed-interval chart buckets over the person-count series, plus the
/// busiest individual frames
use super::Analyzer;
use crate::config::AnalyticsConfig;
use crate::series::DetectionSeries;
use crate::series::DetectionFrame;
use crate::stats::{as_f64, format_time, mean, median, std_dev};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartBucket {
    /// Bucket start as `MM:SS`
    #[serde(rename = "time")]
    pub time_label: String,
    /// Bucket start in seconds
    pub timestamp: f64,
    pub average: f64,
    pub max: usize,
    pub min: usize,
    #[serde(rename = "samples")]
    pub sample_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub overall_average: f64,
    pub overall_max: usize,
    pub overall_min: usize,
    pub median: f64,
    pub std_deviation: f64,
    pub total_samples: usize,
}

/// One of the most crowded frames in the series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakFrame {
    pub frame_index: u64,
    pub timestamp: f64,
    #[serde(rename = "timestamp_formatted")]
    pub time_label: String,
    pub person_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationData {
    pub chart_data: Vec<ChartBucket>,
    pub interval_seconds: f64,
    pub total_intervals: usize,
    pub summary: SeriesSummary,
    /// Busiest frames first; ties keep time order
    pub peak_frames: Vec<PeakFrame>,
}

pub struct VisualizationAggregator {
    interval_seconds: f64,
    peak_frame_count: usize,
}

struct OpenBucket {
    index: u64,
    counts: Vec<usize>,
}

impl VisualizationAggregator {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            interval_seconds: config.visualization_interval_seconds,
            peak_frame_count: config.peak_frame_count,
        }
    }

    fn bucket_index(&self, timestamp: f64) -> u64 {
        let idx = (timestamp / self.interval_seconds).floor();
        if idx > 0.0 {
            idx as u64
        } else {
            0
        }
    }

    fn close(&self, bucket: OpenBucket) -> ChartBucket {
        let start = bucket.index as f64 * self.interval_seconds;
        ChartBucket {
            time_label: format_time(start),
            timestamp: start,
            average: mean(&as_f64(bucket.counts.iter().copied())),
            max: bucket.counts.iter().copied().max().unwrap_or(0),
            min: bucket.counts.iter().copied().min().unwrap_or(0),
            sample_count: bucket.counts.len(),
        }
    }

    fn summarize(series: &DetectionSeries) -> SeriesSummary {
        let counts = as_f64(series.counts());
        SeriesSummary {
            overall_average: mean(&counts),
            overall_max: series.counts().max().unwrap_or(0),
            overall_min: series.counts().min().unwrap_or(0),
            median: median(&counts),
            std_deviation: std_dev(&counts),
            total_samples: series.len(),
        }
    }

    fn peak_frames(&self, series: &DetectionSeries) -> Vec<PeakFrame> {
        let mut frames: Vec<&DetectionFrame> = series.frames().iter().collect();
        // Stable sort, so equal counts stay in time order
        frames.sort_by(|a, b| b.person_count().cmp(&a.person_count()));
        frames
            .into_iter()
            .take(self.peak_frame_count)
            .map(|frame| PeakFrame {
                frame_index: frame.frame_index,
                timestamp: frame.timestamp_seconds,
                time_label: format_time(frame.timestamp_seconds),
                person_count: frame.person_count(),
            })
            .collect()
    }
}

impl Analyzer for VisualizationAggregator {
    type Output = VisualizationData;

    fn id(&self) -> &'static str {
        "visualization_aggregator"
    }

    fn analyze(&self, series: &DetectionSeries) -> VisualizationData {
        let mut chart_data = Vec::new();
        let mut open: Option<OpenBucket> = None;

        // Timestamps are strictly increasing, so buckets arrive in order
        for frame in series.frames() {
            let index = self.bucket_index(frame.timestamp_seconds);
            if let Some(bucket) = open.as_mut().filter(|b| b.index == index) {
                bucket.counts.push(frame.person_count());
                continue;
            }
            let next = OpenBucket {
                index,
                counts: vec![frame.person_count()],
            };
            if let Some(done) = open.replace(next) {
                chart_data.push(self.close(done));
            }
        }
        if let Some(done) = open {
            chart_data.push(self.close(done));
        }

        VisualizationData {
            total_intervals: chart_data.len(),
            chart_data,
            interval_seconds: self.interval_seconds,
            summary: Self::summarize(series),
            peak_frames: self.peak_frames(series),
        }
    }
}
