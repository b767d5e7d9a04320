//! Core data models for Strandlab
//!
//! These models are used throughout the codebase for representing
//! mineral measurements, ratio measurements, and analysis state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The 15 minerals of a standard hair-tissue panel, in canonical order.
pub const PANEL_MINERALS: [&str; 15] = [
    "Ca", "Mg", "Na", "K", "Cu", "Zn", "P", "Fe", "Mn", "Cr", "Se", "B", "Co", "Mo", "S",
];

/// The 6 tracked mineral ratios as (numerator, denominator) pairs.
pub const PANEL_RATIOS: [(&str, &str); 6] = [
    ("Ca", "Mg"),
    ("Ca", "K"),
    ("Na", "K"),
    ("Na", "Mg"),
    ("Zn", "Cu"),
    ("Ca", "P"),
];

/// Canonical key for a ratio, e.g. "Ca/Mg".
pub fn ratio_key(numerator: &str, denominator: &str) -> String {
    format!("{numerator}/{denominator}")
}

/// Classification status relative to an ideal range
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Low,
    #[default]
    Optimal,
    High,
}

impl Status {
    /// Whether the status is outside the ideal band.
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Status::Optimal)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Low => write!(f, "low"),
            Status::Optimal => write!(f, "optimal"),
            Status::High => write!(f, "high"),
        }
    }
}

/// Whether a range applies to a raw mineral reading or a computed ratio.
///
/// Minerals classify with a deliberate buffer zone (0.7x min / 1.3x max);
/// ratios classify against the unscaled bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeKind {
    Mineral,
    Ratio,
}

/// An ideal numeric band for a mineral or ratio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdealRange {
    pub min: f64,
    pub max: f64,
    /// Display unit, e.g. "mg%" for minerals; empty for dimensionless ratios
    #[serde(default)]
    pub unit: String,
}

impl IdealRange {
    pub fn new(min: f64, max: f64, unit: impl Into<String>) -> Self {
        Self {
            min,
            max,
            unit: unit.into(),
        }
    }

    /// Midpoint of the ideal band.
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// Distance from the ideal band (0 when inside).
    pub fn distance(&self, value: f64) -> f64 {
        if value < self.min {
            self.min - value
        } else if value > self.max {
            value - self.max
        } else {
            0.0
        }
    }
}

/// A single mineral reading with its derived status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MineralMeasurement {
    pub symbol: String,
    pub value: f64,
    pub unit: String,
    pub range: IdealRange,
    pub status: Status,
}

/// Clinical-significance tag carried by each tracked ratio.
///
/// These are practitioner-facing marker labels, not diagnoses; nothing in
/// this enum may reach an end user without passing the guardrails gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RatioSignificance {
    /// Ca/Mg - glycemic balance marker
    GlycemicBalance,
    /// Ca/K - metabolic tempo marker
    MetabolicTempo,
    /// Na/K - vitality / stress-response marker
    Vitality,
    /// Na/Mg - adrenal reserve marker
    AdrenalReserve,
    /// Zn/Cu - immune resilience marker
    ImmuneResilience,
    /// Ca/P - structural balance marker
    StructuralBalance,
}

impl RatioSignificance {
    /// Significance tag for a canonical ratio key, if tracked.
    pub fn for_key(key: &str) -> Option<Self> {
        match key {
            "Ca/Mg" => Some(Self::GlycemicBalance),
            "Ca/K" => Some(Self::MetabolicTempo),
            "Na/K" => Some(Self::Vitality),
            "Na/Mg" => Some(Self::AdrenalReserve),
            "Zn/Cu" => Some(Self::ImmuneResilience),
            "Ca/P" => Some(Self::StructuralBalance),
            _ => None,
        }
    }
}

/// A computed mineral ratio with its derived status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioMeasurement {
    pub numerator: String,
    pub denominator: String,
    /// Computed value; 0 when the denominator reading is 0 (numeric guard,
    /// not a clinical signal - classifies Low by construction)
    pub value: f64,
    pub range: IdealRange,
    pub status: Status,
    pub significance: Option<RatioSignificance>,
}

impl RatioMeasurement {
    /// Canonical key, e.g. "Na/K".
    pub fn key(&self) -> String {
        ratio_key(&self.numerator, &self.denominator)
    }
}

/// One full analysis reduced to the inputs the delta explainer needs
///
/// Maps are ordered so that derived output (drivers, summaries) is
/// deterministic across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisState {
    /// Mineral symbol -> raw concentration
    pub measurements: BTreeMap<String, f64>,
    /// Ratio key ("Ca/Mg") -> computed value
    pub ratios: BTreeMap<String, f64>,
    /// Composite health score at the time of the analysis
    pub score: f64,
    /// Red-flag keys raised by the score composer
    pub flags: Vec<String>,
}

/// Count of statuses across a classified panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub low: usize,
    pub optimal: usize,
    pub high: usize,
}

impl StatusCounts {
    pub fn tally<'a>(statuses: impl Iterator<Item = &'a Status>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                Status::Low => counts.low += 1,
                Status::Optimal => counts.optimal += 1,
                Status::High => counts.high += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.low + self.optimal + self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_key() {
        assert_eq!(ratio_key("Ca", "Mg"), "Ca/Mg");
    }

    #[test]
    fn test_range_distance() {
        let range = IdealRange::new(35.0, 45.0, "mg%");
        assert_eq!(range.distance(40.0), 0.0);
        assert_eq!(range.distance(30.0), 5.0);
        assert_eq!(range.distance(50.0), 5.0);
        assert_eq!(range.midpoint(), 40.0);
    }

    #[test]
    fn test_significance_tags_cover_panel() {
        for (num, den) in PANEL_RATIOS {
            assert!(
                RatioSignificance::for_key(&ratio_key(num, den)).is_some(),
                "missing significance tag for {num}/{den}"
            );
        }
        assert!(RatioSignificance::for_key("Fe/Mn").is_none());
    }

    #[test]
    fn test_status_counts() {
        let statuses = [Status::Low, Status::Optimal, Status::Optimal, Status::High];
        let counts = StatusCounts::tally(statuses.iter());
        assert_eq!(counts.low, 1);
        assert_eq!(counts.optimal, 2);
        assert_eq!(counts.high, 1);
        assert_eq!(counts.total(), 4);
    }
}
