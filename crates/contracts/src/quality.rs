//! Analysis results - Road Quality Analyzer / Anomaly Detector output
//!
//! Also holds the startup calibration baseline, which both analysis
//! stages read.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete road quality class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
    /// Too few ground points this tick
    #[default]
    Unknown,
    /// Analysis fault
    Error,
}

impl RoadQuality {
    /// Score attached to each class.
    pub fn score(self) -> u8 {
        match self {
            Self::Excellent => 90,
            Self::Good => 75,
            Self::Fair => 50,
            Self::Poor => 25,
            Self::VeryPoor => 10,
            Self::Unknown => 50,
            Self::Error => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::VeryPoor => "very_poor",
            Self::Unknown => "unknown",
            Self::Error => "error",
        }
    }

    /// Whether the class came from an actual measurement.
    pub fn is_measured(self) -> bool {
        !matches!(self, Self::Unknown | Self::Error)
    }
}

impl fmt::Display for RoadQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tick road quality metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadQualityMetrics {
    pub quality: RoadQuality,

    /// [0, 100]
    pub quality_score: u8,

    /// variance / mean * 100, always >= 0
    pub roughness_index: f64,

    /// Population variance of ground-point distances
    pub variance: f64,

    pub mean_distance_mm: f64,

    /// Number of ground points that passed the band/window filter
    #[serde(default)]
    pub ground_points: usize,

    /// Height profile sorted by angle, `-(distance - mean)` in mm
    #[serde(default)]
    pub profile_mm: Vec<f64>,
}

impl RoadQualityMetrics {
    /// Metrics reported when fewer than the minimum ground points exist.
    pub fn unknown(ground_points: usize) -> Self {
        Self::with_quality(RoadQuality::Unknown, ground_points)
    }

    /// Metrics reported after an analysis fault.
    pub fn error(ground_points: usize) -> Self {
        Self::with_quality(RoadQuality::Error, ground_points)
    }

    fn with_quality(quality: RoadQuality, ground_points: usize) -> Self {
        Self {
            quality,
            quality_score: quality.score(),
            roughness_index: 0.0,
            variance: 0.0,
            mean_distance_mm: 0.0,
            ground_points,
            profile_mm: Vec::new(),
        }
    }
}

impl Default for RoadQualityMetrics {
    fn default() -> Self {
        Self::unknown(0)
    }
}

/// Hazard kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Pothole,
    Bump,
    Crack,
}

impl AnomalyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pothole => "pothole",
            Self::Bump => "bump",
            Self::Crack => "crack",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hazard severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected hazard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub kind: AnomalyKind,

    /// Depth, height, or mean step size in mm depending on kind
    pub magnitude_mm: f64,

    /// Rough width estimate, 2 cm per clustered sample
    pub width_cm: u32,

    pub severity: Severity,

    /// Indices into the narrow-band ground points (first differences for cracks)
    pub sample_indices: BTreeSet<usize>,
}

/// Anomaly Detector output for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<AnomalyEvent>,
    pub has_anomaly: bool,

    /// Median ground distance, 0 when the frame had too few ground points
    pub baseline_mm: f64,
}

impl AnomalyReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_events(anomalies: Vec<AnomalyEvent>, baseline_mm: f64) -> Self {
        Self {
            has_anomaly: !anomalies.is_empty(),
            anomalies,
            baseline_mm,
        }
    }
}

/// Mounting orientation inferred from the stationary gravity reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
    Tilted,
    #[default]
    Unknown,
}

impl Orientation {
    /// Classify a mean vertical gravity reading in g.
    pub fn from_gravity(z_g: f64) -> Self {
        if 0.8 < z_g && z_g < 1.2 {
            Self::Horizontal
        } else if -0.2 < z_g && z_g < 0.2 {
            Self::Vertical
        } else {
            Self::Tilted
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
            Self::Tilted => "tilted",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Stationary reference captured once at startup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBaseline {
    pub accel_baseline_g: f64,
    pub ground_distance_baseline_mm: f64,
    pub orientation: Orientation,
    pub captured_at: DateTime<Utc>,
}
