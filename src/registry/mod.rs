//! Reference Range Registry & Versioning
//!
//! Canonical, versioned ideal ranges and the classification primitive the
//! rest of the engine builds on.
//!
//! # Classification
//!
//! ```text
//! Mineral:  Low  if value < min x 0.7
//!           High if value > max x 1.3
//!           else Optimal            (deliberate buffer zone)
//! Ratio:    unscaled min/max, no buffer
//! ```
//!
//! The asymmetry is intentional: mineral readings carry sampling noise a
//! ratio of two readings partially cancels, so ratios classify tight.
//!
//! # Concurrency
//!
//! All classification is pure. The one mutable cell is the active-version
//! pointer; activation is a single atomic swap under a write lock, never an
//! in-place edit of a version record.

mod loader;
mod ranges;
mod version;

pub use loader::{load_version_file, save_version_file};
pub use ranges::{builtin_table, RangeTable};
pub use version::{
    compare_tables, diff_tables, ChangeCategory, ChangeImpact, RangeChange,
    ReferenceRangeVersion, SymbolChange, VersionComparison,
};

use crate::models::{IdealRange, RangeKind, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};

/// Lower buffer factor for mineral classification.
pub const MINERAL_LOW_BUFFER: f64 = 0.7;
/// Upper buffer factor for mineral classification.
pub const MINERAL_HIGH_BUFFER: f64 = 1.3;

/// Errors raised by registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid range for {symbol}: {reason}")]
    InvalidRange { symbol: String, reason: String },

    #[error("malformed version id '{0}': expected MAJOR.MINOR.PATCH")]
    MalformedVersionId(String),

    #[error("version '{0}' already exists")]
    DuplicateVersion(String),

    #[error("unknown version '{0}'")]
    UnknownVersion(String),

    #[error("no active reference-range version")]
    NoActiveVersion,

    #[error("failed to read version file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse version file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize version file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Classify a value against an ideal range.
///
/// Monotonic in `value`: raising a value can only move the status in the
/// Low -> Optimal -> High direction.
pub fn classify(value: f64, range: &IdealRange, kind: RangeKind) -> Status {
    let (low_bound, high_bound) = match kind {
        RangeKind::Mineral => (range.min * MINERAL_LOW_BUFFER, range.max * MINERAL_HIGH_BUFFER),
        RangeKind::Ratio => (range.min, range.max),
    };
    if value < low_bound {
        Status::Low
    } else if value > high_bound {
        Status::High
    } else {
        Status::Optimal
    }
}

/// Classify a full raw panel against one version's range table.
///
/// Every panel mineral and tracked ratio gets a labeled result; a missing
/// reading arrives as 0 (resolved upstream, see pipeline) and classifies
/// Low rather than failing. Ratio values divide to 0 when the denominator
/// reading is 0.
pub fn classify_panel(
    values: &BTreeMap<String, f64>,
    table: &RangeTable,
) -> (Vec<crate::models::MineralMeasurement>, Vec<crate::models::RatioMeasurement>) {
    use crate::models::{ratio_key, MineralMeasurement, RatioMeasurement, RatioSignificance};
    use crate::models::{PANEL_MINERALS, PANEL_RATIOS};

    let mut minerals = Vec::with_capacity(PANEL_MINERALS.len());
    for symbol in PANEL_MINERALS {
        let Some(range) = table.mineral(symbol) else {
            continue;
        };
        let value = values.get(symbol).copied().unwrap_or(0.0);
        minerals.push(MineralMeasurement {
            symbol: symbol.to_string(),
            value,
            unit: range.unit.clone(),
            range: range.clone(),
            status: classify(value, range, RangeKind::Mineral),
        });
    }

    let mut ratios = Vec::with_capacity(PANEL_RATIOS.len());
    for (num, den) in PANEL_RATIOS {
        let key = ratio_key(num, den);
        let Some(range) = table.ratio(&key) else {
            continue;
        };
        let numerator = values.get(num).copied().unwrap_or(0.0);
        let denominator = values.get(den).copied().unwrap_or(0.0);
        let value = if denominator == 0.0 {
            0.0
        } else {
            numerator / denominator
        };
        ratios.push(RatioMeasurement {
            numerator: num.to_string(),
            denominator: den.to_string(),
            value,
            range: range.clone(),
            status: classify(value, range, RangeKind::Ratio),
            significance: RatioSignificance::for_key(&key),
        });
    }

    (minerals, ratios)
}

/// Severity of a recommended migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationSeverity {
    /// Fewer than 10% of values flip status
    Low,
    /// 10-30% of values flip status
    Medium,
    /// 30% or more of values flip status
    High,
}

/// Result of evaluating whether an analysis should migrate versions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationAdvice {
    pub recommended: bool,
    pub severity: MigrationSeverity,
    /// Symbols whose status flips under the target version
    pub flipped_symbols: Vec<String>,
    pub evaluated: usize,
}

/// Parameters for authoring a new version
#[derive(Debug, Clone)]
pub struct VersionParams {
    pub id: String,
    pub name: String,
    pub standard: String,
    pub effective_at: Option<DateTime<Utc>>,
    pub supersedes: Option<String>,
    pub table: RangeTable,
    pub rationale: String,
}

struct RegistryState {
    versions: BTreeMap<String, ReferenceRangeVersion>,
    active: Option<String>,
}

/// The versioned reference-range registry
///
/// Passed by reference wherever ranges are needed; there is no global
/// registry. Reads are lock-cheap clones; the only write paths are version
/// creation and the activation swap.
pub struct ReferenceRangeRegistry {
    state: RwLock<RegistryState>,
}

impl Default for ReferenceRangeRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ReferenceRangeRegistry {
    /// Empty registry with no versions.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                versions: BTreeMap::new(),
                active: None,
            }),
        }
    }

    /// Registry seeded with the built-in v2.1.0 table, already active.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        let params = VersionParams {
            id: "2.1.0".to_string(),
            name: "Strandlab reference panel".to_string(),
            standard: "TEI-2019".to_string(),
            effective_at: None,
            supersedes: None,
            table: builtin_table(),
            rationale: "built-in laboratory standard".to_string(),
        };
        // The built-in table is validated by construction; creation and
        // activation of a fresh id in an empty registry cannot fail.
        let id = params.id.clone();
        registry
            .create_version(params)
            .and_then(|_| registry.activate(&id))
            .expect("built-in version is valid");
        registry
    }

    /// Author a new version. Validates bounds and id, derives the change
    /// log against the superseded version, and stores the version inactive.
    pub fn create_version(&self, params: VersionParams) -> Result<String, RegistryError> {
        validate_version_id(&params.id)?;
        validate_table(&params.table)?;

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.versions.contains_key(&params.id) {
            return Err(RegistryError::DuplicateVersion(params.id));
        }
        let changes = match &params.supersedes {
            Some(prior_id) => {
                let prior = state
                    .versions
                    .get(prior_id)
                    .ok_or_else(|| RegistryError::UnknownVersion(prior_id.clone()))?;
                diff_tables(&prior.table, &params.table, &params.rationale)
            }
            None => Vec::new(),
        };

        let now = Utc::now();
        let version = ReferenceRangeVersion {
            id: params.id.clone(),
            name: params.name,
            standard: params.standard,
            created_at: now,
            effective_at: params.effective_at.unwrap_or(now),
            deprecated_at: None,
            supersedes: params.supersedes,
            changes,
            table: params.table,
            active: false,
        };
        debug!(id = %version.id, changes = version.changes.len(), "version created");
        let id = version.id.clone();
        state.versions.insert(id.clone(), version);
        Ok(id)
    }

    /// Activate a version: the critical section. Exactly one version is
    /// active afterwards; the previously active version is deprecated.
    pub fn activate(&self, id: &str) -> Result<(), RegistryError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if !state.versions.contains_key(id) {
            return Err(RegistryError::UnknownVersion(id.to_string()));
        }
        if state.active.as_deref() == Some(id) {
            return Ok(());
        }
        if let Some(previous_id) = state.active.take() {
            if let Some(previous) = state.versions.get_mut(&previous_id) {
                previous.active = false;
                previous.deprecated_at = Some(Utc::now());
            }
        }
        if let Some(version) = state.versions.get_mut(id) {
            version.active = true;
        }
        state.active = Some(id.to_string());
        info!(id, "reference-range version activated");
        Ok(())
    }

    /// Id of the currently active version.
    pub fn active_id(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .active
            .clone()
    }

    /// Snapshot of the currently active version.
    pub fn active_version(&self) -> Result<ReferenceRangeVersion, RegistryError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .active
            .as_ref()
            .and_then(|id| state.versions.get(id))
            .cloned()
            .ok_or(RegistryError::NoActiveVersion)
    }

    /// Snapshot of a version by id.
    pub fn get(&self, id: &str) -> Result<ReferenceRangeVersion, RegistryError> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .versions
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownVersion(id.to_string()))
    }

    /// All registered version ids in id order.
    pub fn version_ids(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .versions
            .keys()
            .cloned()
            .collect()
    }

    /// Compare two versions symbol by symbol.
    pub fn compare_versions(&self, from: &str, to: &str) -> Result<VersionComparison, RegistryError> {
        let from_version = self.get(from)?;
        let to_version = self.get(to)?;
        Ok(compare_tables(&from_version, &to_version))
    }

    /// Recommend migration of an analysis pinned to `current` toward
    /// `target`, based on how many of its values would change status.
    pub fn should_migrate_analysis(
        &self,
        current: &str,
        target: &str,
        values: &BTreeMap<String, f64>,
    ) -> Result<MigrationAdvice, RegistryError> {
        let current_version = self.get(current)?;
        let target_version = self.get(target)?;

        let mut flipped_symbols = Vec::new();
        let mut evaluated = 0;
        for (symbol, value) in values {
            let (old_band, new_band) = (
                current_version.table.mineral(symbol),
                target_version.table.mineral(symbol),
            );
            let (Some(old_band), Some(new_band)) = (old_band, new_band) else {
                continue;
            };
            evaluated += 1;
            let old_status = classify(*value, old_band, RangeKind::Mineral);
            let new_status = classify(*value, new_band, RangeKind::Mineral);
            if old_status != new_status {
                flipped_symbols.push(symbol.clone());
            }
        }

        let fraction = if evaluated == 0 {
            0.0
        } else {
            flipped_symbols.len() as f64 / evaluated as f64
        };
        let severity = if fraction >= 0.30 {
            MigrationSeverity::High
        } else if fraction >= 0.10 {
            MigrationSeverity::Medium
        } else {
            MigrationSeverity::Low
        };
        let recommended =
            target_version.active && !current_version.active && !flipped_symbols.is_empty();

        Ok(MigrationAdvice {
            recommended,
            severity,
            flipped_symbols,
            evaluated,
        })
    }
}

/// Validate a MAJOR.MINOR.PATCH version id.
fn validate_version_id(id: &str) -> Result<(), RegistryError> {
    let parts: Vec<&str> = id.split('.').collect();
    let well_formed = parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if well_formed {
        Ok(())
    } else {
        Err(RegistryError::MalformedVersionId(id.to_string()))
    }
}

/// Validate every band in a candidate table: min < max, non-negative.
fn validate_table(table: &RangeTable) -> Result<(), RegistryError> {
    for symbol in table.symbols().map(str::to_string).collect::<Vec<_>>() {
        let range = table.get(&symbol).expect("symbol from table iteration");
        if range.min < 0.0 || range.max < 0.0 {
            return Err(RegistryError::InvalidRange {
                symbol,
                reason: "bounds must be non-negative".to_string(),
            });
        }
        if range.min >= range.max {
            return Err(RegistryError::InvalidRange {
                symbol,
                reason: format!("min {} must be below max {}", range.min, range.max),
            });
        }
    }
    Ok(())
}
