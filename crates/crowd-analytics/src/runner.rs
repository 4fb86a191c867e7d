//! Batch boundary: detection batch files in, report JSON out.
//!
//! This is the only layer that touches the filesystem or the process-wide
//! Prometheus registry. The analyzers themselves stay pure.

use crate::config::AnalyticsConfig;
use crate::error::AnalyticsError;
use crate::report::AnalyticsReport;
use crate::series::DetectionSeries;
use anyhow::{Context, Result};
use common::detections::DetectionBatch;
use common::validation::validate_id;
use std::path::{Path, PathBuf};
use telemetry::metrics::{
    ANALYTICS_BOTTLENECKS, ANALYTICS_DURATION, ANALYTICS_FRAMES_ANALYZED,
    ANALYTICS_FRAMES_SKIPPED, ANALYTICS_RUNS,
};
use tracing::{info, warn};

/// How reports are emitted
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write `<source_id>.report.json` here instead of returning the text only
    pub output_dir: Option<PathBuf>,
    pub pretty: bool,
    /// Treat a batch with no usable frames as an error
    pub require_frames: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub source_id: String,
    pub report: AnalyticsReport,
    pub rendered: String,
    pub written_to: Option<PathBuf>,
}

/// Analyze one batch, recording run metrics.
///
/// Frame size reported by the detector overrides the configured one.
pub fn analyze_batch(
    batch: DetectionBatch,
    config: &AnalyticsConfig,
) -> std::result::Result<AnalyticsReport, AnalyticsError> {
    let config = config.clone().with_frame_size(
        batch.frame_width.unwrap_or(config.frame_width),
        batch.frame_height.unwrap_or(config.frame_height),
    );
    let series = DetectionSeries::from_records(batch.frames);

    let timer = ANALYTICS_DURATION.start_timer();
    let result = AnalyticsReport::assemble(&series, &config);
    timer.observe_duration();

    match &result {
        Ok(report) => record_report(&series, report),
        Err(e) => {
            ANALYTICS_RUNS.with_label_values(&[status_label(e)]).inc();
        }
    }
    result
}

fn record_report(series: &DetectionSeries, report: &AnalyticsReport) {
    let status = if report.is_empty() { "empty" } else { "success" };
    ANALYTICS_RUNS.with_label_values(&[status]).inc();
    ANALYTICS_FRAMES_ANALYZED.inc_by(report.frames_analyzed as u64);
    for skipped in series.skipped() {
        ANALYTICS_FRAMES_SKIPPED
            .with_label_values(&[skipped.reason.as_str()])
            .inc();
    }
    for period in &report.bottleneck_analysis.bottleneck_periods {
        ANALYTICS_BOTTLENECKS
            .with_label_values(&[period.severity_label.as_str()])
            .inc();
    }
}

fn status_label(err: &AnalyticsError) -> &'static str {
    match err {
        AnalyticsError::InvalidConfiguration(_) => "invalid_configuration",
        AnalyticsError::EmptySeries => "empty",
        AnalyticsError::MalformedFrame { .. } => "error",
    }
}

pub fn load_batch(path: &Path) -> Result<DetectionBatch> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read detection batch {}", path.display()))?;
    DetectionBatch::from_json_str(&raw)
        .with_context(|| format!("Invalid detection batch {}", path.display()))
}

pub fn render(report: &AnalyticsReport, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        report.to_json_pretty()
    } else {
        report.to_json()
    };
    rendered.context("Failed to serialize analytics report")
}

/// Write the rendered report as `<dir>/<source_id>.report.json`
pub fn write_report(dir: &Path, source_id: &str, rendered: &str) -> Result<PathBuf> {
    validate_id(source_id, "source_id")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let path = dir.join(format!("{}.report.json", source_id));
    std::fs::write(&path, rendered)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}

/// Load, analyze, render and optionally persist one batch file
pub fn run_file(path: &Path, config: &AnalyticsConfig, options: &RunOptions) -> Result<RunOutcome> {
    let batch = load_batch(path)?;
    let source_id = batch.source_id.clone();
    info!(
        source_id = %source_id,
        records = batch.frames.len(),
        detections = batch.total_detections(),
        "analyzing detection batch"
    );

    let mut report = analyze_batch(batch, config)
        .with_context(|| format!("Analysis failed for {}", source_id))?;
    if options.require_frames {
        report = report
            .ensure_not_empty()
            .with_context(|| format!("No usable frames in {}", source_id))?;
    } else if report.is_empty() {
        warn!(source_id = %source_id, "batch has no usable frames, emitting empty report");
    }

    let rendered = render(&report, options.pretty)?;
    let written_to = match &options.output_dir {
        Some(dir) => Some(write_report(dir, &source_id, &rendered)?),
        None => None,
    };

    Ok(RunOutcome {
        source_id,
        report,
        rendered,
        written_to,
    })
}

/// Run every input, at most `max_parallel` at a time.
///
/// Results come back in input order. Batches share nothing, so each one in a
/// wave gets its own scoped thread.
pub fn run_files(
    paths: &[PathBuf],
    config: &AnalyticsConfig,
    options: &RunOptions,
    max_parallel: usize,
) -> Vec<Result<RunOutcome>> {
    let mut results = Vec::with_capacity(paths.len());
    for wave in paths.chunks(max_parallel.max(1)) {
        std::thread::scope(|scope| {
            let handles: Vec<_> = wave
                .iter()
                .map(|path| scope.spawn(move || run_file(path, config, options)))
                .collect();
            results.extend(handles.into_iter().map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("analysis thread panicked")))
            }));
        });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::detections::{BoundingBox, FrameRecord};

    fn batch(source_id: &str, counts: &[usize]) -> DetectionBatch {
        let person = BoundingBox::centered_at(960.0, 540.0, 50.0, 150.0);
        DetectionBatch {
            source_id: source_id.to_string(),
            frame_width: None,
            frame_height: None,
            frames: counts
                .iter()
                .enumerate()
                .map(|(i, &c)| FrameRecord::new(i as u64, i as f64, vec![person; c]))
                .collect(),
        }
    }

    #[test]
    fn test_batch_frame_size_overrides_config() {
        // (960, 540) is the center of 1920x1080 but the top-left of 4K
        let mut b = batch("cam-4k", &[2, 2, 2]);
        b.frame_width = Some(3840);
        b.frame_height = Some(2160);

        let report = analyze_batch(b, &AnalyticsConfig::default()).unwrap();
        assert_eq!(
            report.spatial_distribution.distribution_pattern.label(),
            "Concentrated in top-left"
        );
    }

    #[test]
    fn test_analyze_batch_records_metrics() {
        let before = ANALYTICS_FRAMES_ANALYZED.get();
        let report = analyze_batch(batch("cam-1", &[1, 2, 3]), &AnalyticsConfig::default()).unwrap();
        assert_eq!(report.frames_analyzed, 3);
        assert!(ANALYTICS_FRAMES_ANALYZED.get() >= before + 3);
    }

    #[test]
    fn test_run_file_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("batch.json");
        std::fs::write(&input, serde_json::to_string(&batch("lobby", &[3, 4, 5])).unwrap()).unwrap();

        let options = RunOptions {
            output_dir: Some(dir.path().join("out")),
            pretty: true,
            require_frames: true,
        };
        let outcome = run_file(&input, &AnalyticsConfig::default(), &options).unwrap();

        let written = outcome.written_to.unwrap();
        assert_eq!(written, dir.path().join("out").join("lobby.report.json"));
        let on_disk = std::fs::read_to_string(&written).unwrap();
        assert_eq!(on_disk, outcome.rendered);
        assert!(on_disk.contains("\"bottleneck_analysis\""));
    }

    #[test]
    fn test_require_frames_rejects_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.json");
        std::fs::write(&input, r#"{"source_id": "empty", "frames": []}"#).unwrap();

        let strict = RunOptions {
            require_frames: true,
            ..Default::default()
        };
        let err = run_file(&input, &AnalyticsConfig::default(), &strict).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalyticsError>(),
            Some(AnalyticsError::EmptySeries)
        ));

        let lenient = run_file(&input, &AnalyticsConfig::default(), &RunOptions::default()).unwrap();
        assert!(lenient.report.is_empty());
        assert!(lenient.written_to.is_none());
    }

    #[test]
    fn test_run_files_bounds_parallelism_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..5 {
            let path = dir.path().join(format!("cam-{}.json", i));
            let b = batch(&format!("cam-{}", i), &vec![i + 1; 3]);
            std::fs::write(&path, serde_json::to_string(&b).unwrap()).unwrap();
            paths.push(path);
        }
        paths.push(dir.path().join("missing.json"));

        let results = run_files(&paths, &AnalyticsConfig::default(), &RunOptions::default(), 2);

        assert_eq!(results.len(), 6);
        for (i, result) in results.iter().take(5).enumerate() {
            let outcome = result.as_ref().unwrap();
            assert_eq!(outcome.source_id, format!("cam-{}", i));
            assert_eq!(outcome.report.crowd_density.person_count, (i + 1) as f64);
        }
        assert!(results[5].is_err());

        // A zero limit still makes progress
        assert_eq!(
            run_files(&paths[..1], &AnalyticsConfig::default(), &RunOptions::default(), 0).len(),
            1
        );
    }

    #[test]
    fn test_write_report_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_report(dir.path(), "../escape", "{}").is_err());
        assert!(write_report(dir.path(), "", "{}").is_err());
    }

    #[test]
    fn test_load_batch_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.json");
        std::fs::write(&input, "{not json").unwrap();

        let err = load_batch(&input).unwrap_err();
        assert!(err.to_string().contains("Invalid detection batch"));
    }
}
