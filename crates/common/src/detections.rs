//! Detection contracts exchanged with the person-detection boundary.
//!
//! The upstream detector emits one [`FrameRecord`] per sampled video frame,
//! wrapped in a [`DetectionBatch`] per source video. Records are lenient on
//! purpose: every field is optional on the wire, and a frame that fails to
//! parse at all is kept as a record carrying its parse error, so a single
//! broken frame does not reject the whole batch. Turning records into a
//! validated series is the analytics engine's job.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One detected person in one frame, in pixel coordinates
///
/// Accepts either named corners or a `bbox: [x1, y1, x2, y2]` array on the
/// wire. Always serializes as named corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "BoundingBoxRepr")]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,

    /// Detection confidence (0.0 to 1.0)
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoundingBoxRepr {
    Corners {
        x_min: f32,
        y_min: f32,
        x_max: f32,
        y_max: f32,
        #[serde(default = "default_confidence")]
        confidence: f32,
    },
    Bbox {
        bbox: [f32; 4],
        #[serde(default = "default_confidence")]
        confidence: f32,
    },
}

impl From<BoundingBoxRepr> for BoundingBox {
    fn from(repr: BoundingBoxRepr) -> Self {
        match repr {
            BoundingBoxRepr::Corners {
                x_min,
                y_min,
                x_max,
                y_max,
                confidence,
            } => Self::new(x_min, y_min, x_max, y_max, confidence),
            BoundingBoxRepr::Bbox {
                bbox: [x1, y1, x2, y2],
                confidence,
            } => Self::new(x1, y1, x2, y2, confidence),
        }
    }
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32, confidence: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
            confidence,
        }
    }

    /// Box of the given size centered on `(cx, cy)`
    pub fn centered_at(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
            1.0,
        )
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    /// Center point (x, y)
    pub fn center(&self) -> (f32, f32) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Finite coordinates, non-inverted extents and a confidence in [0, 1]
    pub fn is_well_formed(&self) -> bool {
        let coords = [self.x_min, self.y_min, self.x_max, self.y_max];
        coords.iter().all(|c| c.is_finite())
            && self.x_max >= self.x_min
            && self.y_max >= self.y_min
            && (0.0..=1.0).contains(&self.confidence)
    }
}

/// Raw per-frame output of the detector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Frame sequence number within the source video
    #[serde(alias = "frame_number", skip_serializing_if = "Option::is_none")]
    pub frame_index: Option<u64>,

    /// Offset from the start of the video, in seconds
    #[serde(alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp_seconds: Option<f64>,

    /// Redundant person count some detectors attach; must match `detections`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_count: Option<usize>,

    /// Person detections in this frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<BoundingBox>>,

    /// Set when the record could not be parsed; the frame is then unusable
    #[serde(skip)]
    pub parse_error: Option<String>,
}

impl FrameRecord {
    pub fn new(frame_index: u64, timestamp_seconds: f64, detections: Vec<BoundingBox>) -> Self {
        Self {
            frame_index: Some(frame_index),
            timestamp_seconds: Some(timestamp_seconds),
            person_count: None,
            detections: Some(detections),
            parse_error: None,
        }
    }

    /// Parse one wire record, keeping a failure as an unusable record.
    ///
    /// The frame index is still recovered when present so the failure can be
    /// attributed to a frame.
    pub fn from_value(value: Value) -> Self {
        let frame_index = value
            .get("frame_index")
            .or_else(|| value.get("frame_number"))
            .and_then(Value::as_u64);
        match serde_json::from_value(value) {
            Ok(record) => record,
            Err(e) => Self {
                frame_index,
                parse_error: Some(e.to_string()),
                ..Default::default()
            },
        }
    }
}

fn lenient_frames<'de, D>(deserializer: D) -> std::result::Result<Vec<FrameRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(FrameRecord::from_value).collect())
}

/// All frame records produced for one source video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    /// Source video or upload identifier
    pub source_id: String,

    /// Frame width in pixels, when the detector reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_width: Option<u32>,

    /// Frame height in pixels, when the detector reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_height: Option<u32>,

    #[serde(default, deserialize_with = "lenient_frames")]
    pub frames: Vec<FrameRecord>,
}

impl DetectionBatch {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse detection batch JSON")
    }

    /// Number of bounding boxes across all records that carry detections
    pub fn total_detections(&self) -> usize {
        self.frames
            .iter()
            .filter_map(|f| f.detections.as_ref())
            .map(Vec::len)
            .sum()
    }
}
