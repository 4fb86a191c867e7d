//! Validated, time-ordered detection series.
//!
//! A [`DetectionSeries`] is the only input the analyzers accept. It is built
//! once from detector output and never mutated afterwards. Frames that would
//! break the ordering invariants, or that are missing required data, are
//! skipped with a warning instead of failing the whole analysis.

use crate::error::{AnalyticsError, MalformedReason};
use common::detections::{BoundingBox, FrameRecord};
use serde::Serialize;

/// One sampled frame with its person detections
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionFrame {
    pub frame_index: u64,
    pub timestamp_seconds: f64,
    pub detections: Vec<BoundingBox>,
}

impl DetectionFrame {
    pub fn new(frame_index: u64, timestamp_seconds: f64, detections: Vec<BoundingBox>) -> Self {
        Self {
            frame_index,
            timestamp_seconds,
            detections,
        }
    }

    pub fn person_count(&self) -> usize {
        self.detections.len()
    }
}

/// A frame rejected while the series was built
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkippedFrame {
    /// Position of the frame in the input sequence
    pub position: usize,
    pub frame_index: Option<u64>,
    pub reason: MalformedReason,
}

impl SkippedFrame {
    /// The recoverable error this skip stands for
    pub fn to_error(&self) -> AnalyticsError {
        AnalyticsError::MalformedFrame {
            frame_index: self.frame_index,
            reason: self.reason,
        }
    }
}

/// Ordered detection frames with strictly increasing timestamps and
/// non-decreasing frame indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSeries {
    frames: Vec<DetectionFrame>,
    skipped: Vec<SkippedFrame>,
}

impl DetectionSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from typed frames, skipping any that break the ordering
    pub fn from_frames(frames: impl IntoIterator<Item = DetectionFrame>) -> Self {
        let mut builder = SeriesBuilder::default();
        for frame in frames {
            builder.push_frame(frame);
        }
        builder.finish()
    }

    /// Build from raw detector records, skipping malformed ones
    pub fn from_records(records: impl IntoIterator<Item = FrameRecord>) -> Self {
        let mut builder = SeriesBuilder::default();
        for record in records {
            builder.push_record(record);
        }
        builder.finish()
    }

    pub fn frames(&self) -> &[DetectionFrame] {
        &self.frames
    }

    pub fn skipped(&self) -> &[SkippedFrame] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Person count per frame, in order
    pub fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.frames.iter().map(DetectionFrame::person_count)
    }

    /// Every bounding box in the series
    pub fn detections(&self) -> impl Iterator<Item = &BoundingBox> + '_ {
        self.frames.iter().flat_map(|f| f.detections.iter())
    }

    pub fn total_detections(&self) -> usize {
        self.counts().sum()
    }

    /// Seconds between the first and last accepted frame
    pub fn elapsed_seconds(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.timestamp_seconds - first.timestamp_seconds,
            _ => 0.0,
        }
    }
}

#[derive(Default)]
struct SeriesBuilder {
    frames: Vec<DetectionFrame>,
    skipped: Vec<SkippedFrame>,
    position: usize,
}

impl SeriesBuilder {
    fn push_record(&mut self, record: FrameRecord) {
        let frame_index = record.frame_index;
        if let Some(parse_error) = &record.parse_error {
            tracing::debug!(position = self.position, %parse_error, "unparseable frame record");
        }
        match Self::frame_from_record(record) {
            Ok(frame) => self.push_frame(frame),
            Err(reason) => {
                self.skip(frame_index, reason);
                self.position += 1;
            }
        }
    }

    fn push_frame(&mut self, frame: DetectionFrame) {
        match self.check_frame(&frame) {
            Ok(()) => self.frames.push(frame),
            Err(reason) => self.skip(Some(frame.frame_index), reason),
        }
        self.position += 1;
    }

    fn frame_from_record(record: FrameRecord) -> Result<DetectionFrame, MalformedReason> {
        if record.parse_error.is_some() {
            return Err(MalformedReason::InvalidRecord);
        }
        let frame_index = record
            .frame_index
            .ok_or(MalformedReason::MissingFrameIndex)?;
        let timestamp = record
            .timestamp_seconds
            .ok_or(MalformedReason::MissingTimestamp)?;
        let detections = record.detections.ok_or(MalformedReason::MissingDetections)?;

        if let Some(count) = record.person_count {
            if count != detections.len() {
                return Err(MalformedReason::CountMismatch);
            }
        }

        Ok(DetectionFrame::new(frame_index, timestamp, detections))
    }

    fn check_frame(&self, frame: &DetectionFrame) -> Result<(), MalformedReason> {
        if !frame.timestamp_seconds.is_finite() || frame.timestamp_seconds < 0.0 {
            return Err(MalformedReason::InvalidTimestamp);
        }
        if frame.detections.iter().any(|b| !b.is_well_formed()) {
            return Err(MalformedReason::InvalidBoundingBox);
        }
        if let Some(last) = self.frames.last() {
            if frame.timestamp_seconds <= last.timestamp_seconds {
                return Err(MalformedReason::NonMonotonicTimestamp);
            }
            if frame.frame_index < last.frame_index {
                return Err(MalformedReason::NonMonotonicFrameIndex);
            }
        }
        Ok(())
    }

    fn skip(&mut self, frame_index: Option<u64>, reason: MalformedReason) {
        let skipped = SkippedFrame {
            position: self.position,
            frame_index,
            reason,
        };
        tracing::warn!(
            position = self.position,
            frame_index = ?frame_index,
            reason = %reason,
            error = %skipped.to_error(),
            "skipping malformed detection frame"
        );
        self.skipped.push(skipped);
    }

    fn finish(self) -> DetectionSeries {
        if !self.skipped.is_empty() {
            tracing::debug!(
                accepted = self.frames.len(),
                skipped = self.skipped.len(),
                "detection series built with skipped frames"
            );
        }
        DetectionSeries {
            frames: self.frames,
            skipped: self.skipped,
        }
    }
}
