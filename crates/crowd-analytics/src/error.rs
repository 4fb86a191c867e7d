use serde::Serialize;
use thiserror::Error;

/// Why a detection frame was rejected while building a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    MissingFrameIndex,
    MissingTimestamp,
    MissingDetections,
    InvalidTimestamp,
    NonMonotonicTimestamp,
    NonMonotonicFrameIndex,
    CountMismatch,
    InvalidBoundingBox,
    /// The record could not be parsed at all
    InvalidRecord,
}

impl MalformedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MalformedReason::MissingFrameIndex => "missing_frame_index",
            MalformedReason::MissingTimestamp => "missing_timestamp",
            MalformedReason::MissingDetections => "missing_detections",
            MalformedReason::InvalidTimestamp => "invalid_timestamp",
            MalformedReason::NonMonotonicTimestamp => "non_monotonic_timestamp",
            MalformedReason::NonMonotonicFrameIndex => "non_monotonic_frame_index",
            MalformedReason::CountMismatch => "count_mismatch",
            MalformedReason::InvalidBoundingBox => "invalid_bounding_box",
            MalformedReason::InvalidRecord => "invalid_record",
        }
    }
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("detection series is empty")]
    EmptySeries,

    #[error("malformed frame {}: {reason}", display_index(.frame_index))]
    MalformedFrame {
        frame_index: Option<u64>,
        reason: MalformedReason,
    },
}

fn display_index(frame_index: &Option<u64>) -> String {
    match frame_index {
        Some(index) => index.to_string(),
        None => "<unknown>".to_string(),
    }
}

impl AnalyticsError {
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Whether the calling layer should report this as a client error
    pub fn is_client_error(&self) -> bool {
        match self {
            AnalyticsError::InvalidConfiguration(_) | AnalyticsError::EmptySeries => true,
            AnalyticsError::MalformedFrame { .. } => false,
        }
    }
}

impl From<anyhow::Error> for AnalyticsError {
    fn from(err: anyhow::Error) -> Self {
        AnalyticsError::invalid_configuration(err.to_string())
    }
}

pub type Result<T, E = AnalyticsError> = std::result::Result<T, E>;
