/// Spatial distribution of detections over a 3x3 zone grid
use super::{density::DensityLevel, Analyzer};
use crate::config::AnalyticsConfig;
use crate::series::DetectionSeries;
use common::detections::BoundingBox;
use serde::{Serialize, Serializer};

pub const GRID_ROWS: usize = 3;
pub const GRID_COLS: usize = 3;

/// One cell of the 3x3 grid, row-major
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    MiddleCenter,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Zone {
    pub const ALL: [Zone; GRID_ROWS * GRID_COLS] = [
        Zone::TopLeft,
        Zone::TopCenter,
        Zone::TopRight,
        Zone::MiddleLeft,
        Zone::MiddleCenter,
        Zone::MiddleRight,
        Zone::BottomLeft,
        Zone::BottomCenter,
        Zone::BottomRight,
    ];

    /// Out-of-range indices clamp to the last row/column
    pub fn from_grid(row: usize, col: usize) -> Self {
        let row = row.min(GRID_ROWS - 1);
        let col = col.min(GRID_COLS - 1);
        Self::ALL[row * GRID_COLS + col]
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn row(&self) -> usize {
        self.index() / GRID_COLS
    }

    pub fn col(&self) -> usize {
        self.index() % GRID_COLS
    }

    pub fn zone_id(&self) -> String {
        format!("zone_{}_{}", self.row(), self.col())
    }

    /// Human-readable name, e.g. "Middle-Center"
    pub fn position(&self) -> &'static str {
        match self {
            Zone::TopLeft => "Top-Left",
            Zone::TopCenter => "Top-Center",
            Zone::TopRight => "Top-Right",
            Zone::MiddleLeft => "Middle-Left",
            Zone::MiddleCenter => "Middle-Center",
            Zone::MiddleRight => "Middle-Right",
            Zone::BottomLeft => "Bottom-Left",
            Zone::BottomCenter => "Bottom-Center",
            Zone::BottomRight => "Bottom-Right",
        }
    }

    /// Shares an edge or a corner with `other`
    pub fn is_adjacent(&self, other: &Zone) -> bool {
        self != other && self.row().abs_diff(other.row()) <= 1 && self.col().abs_diff(other.col()) <= 1
    }
}

impl Serialize for Zone {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct ZoneRepr {
            zone_id: String,
            row: usize,
            col: usize,
            position: &'static str,
        }

        ZoneRepr {
            zone_id: self.zone_id(),
            row: self.row(),
            col: self.col(),
            position: self.position(),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStat {
    #[serde(flatten)]
    pub zone: Zone,
    pub detection_count: usize,
    #[serde(rename = "percentage")]
    pub percentage_of_total: f64,
    pub density_level: DensityLevel,
}

/// Shape of the hotspot arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionPattern {
    /// No zone exceeds the hotspot threshold
    Even,
    /// Exactly one hotspot
    ConcentratedIn(Zone),
    /// Two touching hotspots
    Clustered,
    /// Two hotspots separated by at least one zone
    BiModal,
    /// Three or more hotspots
    Distributed,
}

impl DistributionPattern {
    pub fn label(&self) -> String {
        match self {
            DistributionPattern::Even => "Even".to_string(),
            DistributionPattern::ConcentratedIn(Zone::MiddleCenter) => {
                "Concentrated in center".to_string()
            }
            DistributionPattern::ConcentratedIn(zone) => {
                format!("Concentrated in {}", zone.position().to_lowercase())
            }
            DistributionPattern::Clustered => "Clustered".to_string(),
            DistributionPattern::BiModal => "Bi-modal".to_string(),
            DistributionPattern::Distributed => "Distributed".to_string(),
        }
    }

    fn from_hotspots(hotspots: &[ZoneStat]) -> Self {
        match hotspots {
            [] => DistributionPattern::Even,
            [only] => DistributionPattern::ConcentratedIn(only.zone),
            [a, b] if a.zone.is_adjacent(&b.zone) => DistributionPattern::Clustered,
            [_, _] => DistributionPattern::BiModal,
            _ => DistributionPattern::Distributed,
        }
    }
}

impl std::fmt::Display for DistributionPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for DistributionPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridSize {
    pub rows: usize,
    pub cols: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialDistribution {
    pub distribution_pattern: DistributionPattern,
    pub total_detections_analyzed: usize,
    /// All nine zones in row-major order
    pub zones: Vec<ZoneStat>,
    /// Zones above the hotspot threshold, largest share first
    pub hotspots: Vec<ZoneStat>,
    pub grid_size: GridSize,
}

pub struct SpatialDistributionAnalyzer {
    frame_width: f64,
    frame_height: f64,
    hotspot_percentage_threshold: f64,
}

impl SpatialDistributionAnalyzer {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            frame_width: f64::from(config.frame_width),
            frame_height: f64::from(config.frame_height),
            hotspot_percentage_threshold: config.hotspot_percentage_threshold,
        }
    }

    /// Zone containing the center of `bbox`; off-frame centers clamp to the
    /// nearest edge zone
    pub fn zone_for(&self, bbox: &BoundingBox) -> Zone {
        let (cx, cy) = bbox.center();
        Zone::from_grid(
            grid_cell(f64::from(cy), self.frame_height, GRID_ROWS),
            grid_cell(f64::from(cx), self.frame_width, GRID_COLS),
        )
    }
}

fn grid_cell(coord: f64, extent: f64, cells: usize) -> usize {
    let idx = (coord / (extent / cells as f64)).floor();
    // Negative and NaN positions fall into the first cell
    if !(idx > 0.0) {
        0
    } else {
        (idx as usize).min(cells - 1)
    }
}

impl Analyzer for SpatialDistributionAnalyzer {
    type Output = SpatialDistribution;

    fn id(&self) -> &'static str {
        "spatial_distribution_analyzer"
    }

    fn analyze(&self, series: &DetectionSeries) -> SpatialDistribution {
        let mut counts = [0usize; GRID_ROWS * GRID_COLS];
        for bbox in series.detections() {
            counts[self.zone_for(bbox).index()] += 1;
        }
        let total: usize = counts.iter().sum();

        let zones: Vec<ZoneStat> = Zone::ALL
            .iter()
            .map(|zone| {
                let detection_count = counts[zone.index()];
                let percentage_of_total = if total > 0 {
                    detection_count as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                ZoneStat {
                    zone: *zone,
                    detection_count,
                    percentage_of_total,
                    density_level: DensityLevel::from_zone_share(percentage_of_total),
                }
            })
            .collect();

        let mut hotspots: Vec<ZoneStat> = zones
            .iter()
            .filter(|z| z.percentage_of_total > self.hotspot_percentage_threshold)
            .cloned()
            .collect();
        hotspots.sort_by(|a, b| b.percentage_of_total.total_cmp(&a.percentage_of_total));

        let distribution_pattern = DistributionPattern::from_hotspots(&hotspots);

        tracing::debug!(
            total_detections = total,
            hotspots = hotspots.len(),
            pattern = %distribution_pattern,
            "spatial distribution computed"
        );

        SpatialDistribution {
            distribution_pattern,
            total_detections_analyzed: total,
            zones,
            hotspots,
            grid_size: GridSize {
                rows: GRID_ROWS,
                cols: GRID_COLS,
            },
        }
    }
}
