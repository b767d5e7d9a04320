//! Locked scoring semantics with load-time self-check
//!
//! Every constant here changes the *meaning* of a stored score, so the
//! whole table is versioned as one unit. `Semantics::load()` validates the
//! table once and hands out a `'static` reference; a malformed table or
//! weight-sum drift is fatal at load, not discovered mid-analysis.

use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Version of the running engine binary.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the interpretation semantics (weights, bands, disclaimers).
///
/// Bump on any change to the tables in this file.
pub const SEMANTICS_VERSION: &str = "2.1.0";

/// Weight-sum tolerance for the load-time invariant check.
const WEIGHT_TOLERANCE: f64 = 1e-4;

/// Errors raised by the load-time semantics self-check
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("score weights sum to {sum}, expected 1.0 within {WEIGHT_TOLERANCE}")]
    WeightDrift { sum: f64 },

    #[error("malformed score band table: {0}")]
    BandTable(String),

    #[error("malformed disclaimer table: {0}")]
    Disclaimers(String),

    #[error("malformed critical-ratio table: {0}")]
    CriticalRatios(String),
}

/// One row of the fixed score-band table
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBand {
    pub grade: &'static str,
    pub min: f64,
    pub max: f64,
    pub interpretation: &'static str,
    /// Display color hint for presentation collaborators
    pub color: &'static str,
}

impl ScoreBand {
    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }
}

/// Which side of a bound trips a critical-ratio emergency flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RatioBound {
    Below,
    Above,
}

/// A named critical-ratio emergency threshold
#[derive(Debug, Clone, Serialize)]
pub struct CriticalRatioRule {
    /// Stable flag key, e.g. "na-k-inversion"
    pub key: &'static str,
    /// Canonical ratio key, e.g. "Na/K"
    pub ratio: &'static str,
    pub bound: RatioBound,
    pub threshold: f64,
    pub label: &'static str,
}

impl CriticalRatioRule {
    /// Whether a ratio value violates this emergency threshold.
    pub fn violated_by(&self, value: f64) -> bool {
        match self.bound {
            RatioBound::Below => value < self.threshold,
            RatioBound::Above => value > self.threshold,
        }
    }
}

/// Channel-appropriate disclaimer texts
#[derive(Debug, Clone, Serialize)]
pub struct Disclaimers {
    /// Short form for interactive and API channels
    pub short: &'static str,
    /// Reference-interval caveat line prepended on document export
    pub export_caveat: &'static str,
    /// Full legal text for document export
    pub export_full: &'static str,
}

/// The locked semantics table
#[derive(Debug, Clone, Serialize)]
pub struct Semantics {
    pub semantics_version: &'static str,
    /// Weight of the mineral sub-score in the composite (pool = weight x 100)
    pub mineral_weight: f64,
    /// Weight of the ratio sub-score
    pub ratio_weight: f64,
    /// Weight of the red-flag sub-score
    pub red_flag_weight: f64,
    /// Fixed score-band table, highest band first
    pub score_bands: Vec<ScoreBand>,
    /// Named critical-ratio emergency thresholds (scored 1 penalty point each)
    pub critical_ratios: Vec<CriticalRatioRule>,
    pub disclaimers: Disclaimers,
}

static SEMANTICS: OnceLock<Semantics> = OnceLock::new();

impl Semantics {
    /// Validate and return the locked semantics table.
    ///
    /// Validation runs once; later calls return the cached reference.
    pub fn load() -> Result<&'static Semantics, ConfigError> {
        if let Some(semantics) = SEMANTICS.get() {
            return Ok(semantics);
        }
        let built = Semantics::built_in();
        built.validate()?;
        debug!(version = SEMANTICS_VERSION, "semantics table validated");
        Ok(SEMANTICS.get_or_init(|| built))
    }

    fn built_in() -> Self {
        Self {
            semantics_version: SEMANTICS_VERSION,
            mineral_weight: 0.60,
            ratio_weight: 0.30,
            red_flag_weight: 0.10,
            score_bands: vec![
                ScoreBand {
                    grade: "A",
                    min: 90.0,
                    max: 100.0,
                    interpretation: "Mineral pattern well within ideal ranges",
                    color: "#2e7d32",
                },
                ScoreBand {
                    grade: "B",
                    min: 75.0,
                    max: 89.0,
                    interpretation: "Mostly balanced pattern with minor deviations",
                    color: "#689f38",
                },
                ScoreBand {
                    grade: "C",
                    min: 60.0,
                    max: 74.0,
                    interpretation: "Several markers outside their ideal bands",
                    color: "#f9a825",
                },
                ScoreBand {
                    grade: "D",
                    min: 45.0,
                    max: 59.0,
                    interpretation: "Widespread deviations worth practitioner review",
                    color: "#ef6c00",
                },
                ScoreBand {
                    grade: "F",
                    min: 0.0,
                    max: 44.0,
                    interpretation: "Pattern far from ideal ranges across the panel",
                    color: "#c62828",
                },
            ],
            critical_ratios: vec![
                CriticalRatioRule {
                    key: "na-k-inversion",
                    ratio: "Na/K",
                    bound: RatioBound::Below,
                    threshold: 0.8,
                    label: "sodium/potassium inversion",
                },
                CriticalRatioRule {
                    key: "calcium-shell",
                    ratio: "Ca/Mg",
                    bound: RatioBound::Above,
                    threshold: 18.0,
                    label: "calcium shell pattern",
                },
                CriticalRatioRule {
                    key: "copper-imbalance",
                    ratio: "Zn/Cu",
                    bound: RatioBound::Below,
                    threshold: 2.0,
                    label: "zinc/copper imbalance",
                },
            ],
            disclaimers: Disclaimers {
                short: "This summary describes mineral patterns only and is not medical advice.",
                export_caveat: "Reference intervals describe statistical ideal ranges, \
                     not thresholds of disease.",
                export_full: "This report interprets hair-tissue mineral measurements against \
                     versioned reference ranges. It does not diagnose, treat, cure, or prevent \
                     any disease or condition, and it is not a substitute for the judgment of a \
                     qualified health practitioner. Discuss these results and any changes to \
                     diet, supplementation, or lifestyle with your practitioner.",
            },
        }
    }

    /// The load-time self-check (static-assertion equivalent).
    fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.mineral_weight + self.ratio_weight + self.red_flag_weight;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightDrift { sum });
        }
        if self.mineral_weight <= 0.0 || self.ratio_weight <= 0.0 || self.red_flag_weight <= 0.0 {
            return Err(ConfigError::WeightDrift { sum });
        }

        if self.score_bands.is_empty() {
            return Err(ConfigError::BandTable("empty band table".to_string()));
        }
        if self.score_bands.first().map(|b| b.max) != Some(100.0)
            || self.score_bands.last().map(|b| b.min) != Some(0.0)
        {
            return Err(ConfigError::BandTable(
                "bands must cover 0-100".to_string(),
            ));
        }
        for band in &self.score_bands {
            if band.min > band.max {
                return Err(ConfigError::BandTable(format!(
                    "band {} has min {} > max {}",
                    band.grade, band.min, band.max
                )));
            }
            if band.interpretation.is_empty() || band.color.is_empty() {
                return Err(ConfigError::BandTable(format!(
                    "band {} missing interpretation or color",
                    band.grade
                )));
            }
        }
        for pair in self.score_bands.windows(2) {
            if (pair[0].min - pair[1].max - 1.0).abs() > f64::EPSILON {
                return Err(ConfigError::BandTable(format!(
                    "gap or overlap between bands {} and {}",
                    pair[0].grade, pair[1].grade
                )));
            }
        }

        for rule in &self.critical_ratios {
            if rule.threshold <= 0.0 {
                return Err(ConfigError::CriticalRatios(format!(
                    "{} has non-positive threshold",
                    rule.key
                )));
            }
        }

        if self.disclaimers.short.is_empty()
            || self.disclaimers.export_caveat.is_empty()
            || self.disclaimers.export_full.is_empty()
        {
            return Err(ConfigError::Disclaimers(
                "disclaimer text must be non-empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Point pool for the mineral sub-score.
    pub fn mineral_pool(&self) -> f64 {
        self.mineral_weight * 100.0
    }

    /// Point pool for the ratio sub-score.
    pub fn ratio_pool(&self) -> f64 {
        self.ratio_weight * 100.0
    }

    /// Point pool for the red-flag sub-score.
    pub fn red_flag_pool(&self) -> f64 {
        self.red_flag_weight * 100.0
    }

    /// Grade band for a composite score (clamped into 0-100).
    ///
    /// Bands carry integer bounds; a fractional score between two bounds
    /// (e.g. 89.5) falls into the band below it.
    pub fn band_for(&self, score: f64) -> &ScoreBand {
        let clamped = score.clamp(0.0, 100.0);
        self.score_bands
            .iter()
            .find(|band| clamped >= band.min)
            .expect("validated band table covers 0-100")
    }
}
