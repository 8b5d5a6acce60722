//! Data models shared by the classification core and the HTTP layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    // ---
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    // ---
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build a coordinate from optional query parameters.
    ///
    /// Returns `None` unless both values are present, finite and within the
    /// valid latitude/longitude ranges.
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        // ---
        match (lat, lng) {
            (Some(lat), Some(lng))
                if lat.is_finite()
                    && lng.is_finite()
                    && (-90.0..=90.0).contains(&lat)
                    && (-180.0..=180.0).contains(&lng) =>
            {
                Some(Self { lat, lng })
            }
            _ => None,
        }
    }

    /// Parse the optional location of a submitted payload.
    ///
    /// Both parts absent is `Ok(None)`. A lone latitude or longitude, or an
    /// out-of-range pair, is an error.
    pub fn from_payload(lat: Option<f64>, lng: Option<f64>) -> Result<Option<Self>, String> {
        // ---
        match (lat, lng) {
            (None, None) => Ok(None),
            (Some(_), None) | (None, Some(_)) => {
                Err("lat and lng must be supplied together".to_string())
            }
            (lat, lng) => Self::from_parts(lat, lng)
                .map(Some)
                .ok_or_else(|| "Coordinates out of range".to_string()),
        }
    }
}

/// A single geotagged TDS measurement.
///
/// Readings are never mutated after creation; perturbation produces new
/// values (see [`crate::corpus::drift`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: i64,
    pub location_label: String,
    pub tds: f64,
    pub turbidity: Option<f64>,
    pub temperature: Option<f64>,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    // ---
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// Ingestion payload pushed by a sensor or gateway.
///
/// `tds` is optional here so a missing value can be rejected with a
/// client error instead of a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReading {
    // ---
    pub tds: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Coarse safety label shown as the badge color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SafetyScore {
    Safe,
    Risk,
    Unsafe,
}

impl SafetyScore {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyScore::Safe => "Safe",
            SafetyScore::Risk => "Risk",
            SafetyScore::Unsafe => "Unsafe",
        }
    }

    /// Risk and Unsafe both warrant a warning notification.
    pub fn is_alerting(&self) -> bool {
        !matches!(self, SafetyScore::Safe)
    }
}

impl fmt::Display for SafetyScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory output, either the deterministic baseline or an enriched
/// version returned by the external advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    // ---
    pub score: SafetyScore,
    pub tds_level: f64,
    pub recommendation: String,
    pub explanation: String,
    pub side_effects: Vec<String>,
    pub improvement_tips: Vec<String>,
}

/// Category of a community-submitted issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueType {
    Taste,
    Smell,
    Color,
    Health,
}

impl IssueType {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Taste => "Taste",
            IssueType::Smell => "Smell",
            IssueType::Color => "Color",
            IssueType::Health => "Health",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s {
            "Taste" => Ok(IssueType::Taste),
            "Smell" => Ok(IssueType::Smell),
            "Color" => Ok(IssueType::Color),
            "Health" => Ok(IssueType::Health),
            other => Err(format!("unknown issue type '{other}'")),
        }
    }
}

/// A community report about local water quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityReport {
    // ---
    pub id: i64,
    pub issue_type: IssueType,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

/// Report submission body; the store stamps `id` and `timestamp`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReport {
    // ---
    pub issue_type: IssueType,
    pub description: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// One point of the smoothed trend line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    // ---
    pub timestamp: DateTime<Utc>,
    pub tds: f64,
    pub smoothed_tds: i64,
    pub time_label: String,
}

/// A color stop of the heatmap gradient, keyed by normalized intensity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradientStop {
    // ---
    pub threshold: f64,
    pub color: &'static str,
}

/// Rendering parameters for the density layer at a given zoom.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapRenderParams {
    // ---
    pub radius: f64,
    pub blur: f64,
    pub max_intensity: f64,
    pub min_opacity: f64,
    pub gradient_stops: Vec<GradientStop>,
}

/// A weighted point of the heat layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatPoint {
    // ---
    pub lat: f64,
    pub lng: f64,
    pub intensity: f64,
}
