/// Crowd density classification (people per square meter)
use super::Analyzer;
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::series::DetectionSeries;
use crate::stats::{as_f64, mean};
use serde::{Deserialize, Serialize};

/// Ordinal density tier, Very Low (1) to Very High (5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DensityLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Moderate,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl DensityLevel {
    pub const ALL: [DensityLevel; 5] = [
        DensityLevel::VeryLow,
        DensityLevel::Low,
        DensityLevel::Moderate,
        DensityLevel::High,
        DensityLevel::VeryHigh,
    ];

    /// 1 for Very Low up to 5 for Very High
    pub fn severity(&self) -> u8 {
        match self {
            DensityLevel::VeryLow => 1,
            DensityLevel::Low => 2,
            DensityLevel::Moderate => 3,
            DensityLevel::High => 4,
            DensityLevel::VeryHigh => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DensityLevel::VeryLow => "Very Low",
            DensityLevel::Low => "Low",
            DensityLevel::Moderate => "Moderate",
            DensityLevel::High => "High",
            DensityLevel::VeryHigh => "Very High",
        }
    }

    /// Tier for a zone's share of all detections, in percent
    pub fn from_zone_share(percentage: f64) -> Self {
        if percentage > 20.0 {
            DensityLevel::VeryHigh
        } else if percentage > 15.0 {
            DensityLevel::High
        } else if percentage > 10.0 {
            DensityLevel::Moderate
        } else if percentage > 5.0 {
            DensityLevel::Low
        } else {
            DensityLevel::VeryLow
        }
    }
}

impl std::fmt::Display for DensityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrowdDensity {
    /// Number of people rated (the series mean at report level)
    pub person_count: f64,
    pub area_sqm: f64,
    pub density_per_sqm: f64,
    pub density_level: DensityLevel,
    pub severity_score: u8,
}

pub struct DensityClassifier {
    area_sqm: f64,
    thresholds: [f64; 5],
}

impl DensityClassifier {
    /// Fails with `InvalidConfiguration` unless the area is positive and the
    /// tier thresholds are strictly ascending
    pub fn new(config: &AnalyticsConfig) -> Result<Self> {
        if !config.area_sqm.is_finite() || config.area_sqm <= 0.0 {
            return Err(AnalyticsError::invalid_configuration(format!(
                "area_sqm must be greater than 0, got {}",
                config.area_sqm
            )));
        }
        common::validation::validate_ascending(&config.density_thresholds, "density_thresholds")?;

        Ok(Self {
            area_sqm: config.area_sqm,
            thresholds: config.density_thresholds,
        })
    }

    pub fn classify(&self, person_count: usize) -> CrowdDensity {
        self.classify_count(person_count as f64)
    }

    /// Rate a possibly fractional count, e.g. an average over frames
    pub fn classify_count(&self, person_count: f64) -> CrowdDensity {
        let density_per_sqm = person_count / self.area_sqm;
        let density_level = self.level_for(density_per_sqm);

        CrowdDensity {
            person_count,
            area_sqm: self.area_sqm,
            density_per_sqm,
            density_level,
            severity_score: density_level.severity(),
        }
    }

    /// Highest tier whose lower bound does not exceed `density_per_sqm`
    pub fn level_for(&self, density_per_sqm: f64) -> DensityLevel {
        self.thresholds
            .iter()
            .zip(DensityLevel::ALL)
            .rev()
            .find(|(bound, _)| density_per_sqm >= **bound)
            .map(|(_, level)| level)
            .unwrap_or(DensityLevel::VeryLow)
    }
}

impl Analyzer for DensityClassifier {
    type Output = CrowdDensity;

    fn id(&self) -> &'static str {
        "density_classifier"
    }

    fn analyze(&self, series: &DetectionSeries) -> CrowdDensity {
        self.classify_count(mean(&as_f64(series.counts())))
    }
}
