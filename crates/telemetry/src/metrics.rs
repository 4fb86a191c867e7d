use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Crowd Analytics Metrics ====
    pub static ref ANALYTICS_RUNS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "crowd_analytics_runs_total",
                "Total number of analysis runs",
            ),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANALYTICS_DURATION: Histogram = {
        let metric = Histogram::with_opts(
            HistogramOpts::new(
                "crowd_analytics_duration_seconds",
                "Wall time spent assembling one analytics report",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANALYTICS_FRAMES_ANALYZED: IntCounter = {
        let metric = IntCounter::new(
            "crowd_analytics_frames_analyzed_total",
            "Total number of detection frames accepted into a series",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANALYTICS_FRAMES_SKIPPED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "crowd_analytics_frames_skipped_total",
                "Total number of malformed detection frames skipped",
            ),
            &["reason"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANALYTICS_BOTTLENECKS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "crowd_analytics_bottlenecks_total",
                "Total number of bottleneck periods detected",
            ),
            &["severity"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Render every registered metric in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
