pub mod analyzers;
pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod series;
pub mod stats;

pub use analyzers::Analyzer;
pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, MalformedReason};
pub use report::AnalyticsReport;
pub use series::{DetectionFrame, DetectionSeries, SkippedFrame};
