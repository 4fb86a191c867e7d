pub mod bottleneck;
pub mod density;
pub mod flow;
pub mod spatial;
pub mod visualization;

use crate::series::DetectionSeries;

pub use bottleneck::{BottleneckAnalysis, BottleneckDetector, BottleneckPeriod, SeverityLabel};
pub use density::{CrowdDensity, DensityClassifier, DensityLevel};
pub use flow::{FlowMetrics, FlowMetricsCalculator, Trend, Variability};
pub use spatial::{DistributionPattern, SpatialDistribution, SpatialDistributionAnalyzer, Zone, ZoneStat};
pub use visualization::{
    ChartBucket, PeakFrame, SeriesSummary, VisualizationAggregator, VisualizationData,
};

/// A report section derived from a whole detection series.
///
/// Implementations hold only immutable settings taken from the
/// configuration; `analyze` must be a pure function of the series.
pub trait Analyzer {
    type Output;

    /// Stable identifier used in logs (e.g., "bottleneck_detector")
    fn id(&self) -> &'static str;

    fn analyze(&self, series: &DetectionSeries) -> Self::Output;
}
