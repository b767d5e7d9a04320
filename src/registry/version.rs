//! Reference-range version records, change tracking, and comparison
//!
//! A version is an immutable record: its range table never changes after
//! creation. Activation state and deprecation timestamps are managed by the
//! registry under its critical section; everything else here is pure data.

use crate::models::IdealRange;
use crate::registry::ranges::RangeTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a symbol's band moved between two versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeCategory {
    Created,
    MinIncreased,
    MinDecreased,
    MaxIncreased,
    MaxDecreased,
    Widened,
    Narrowed,
    Shifted,
    UnitChanged,
    Deprecated,
}

impl std::fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChangeCategory::Created => "created",
            ChangeCategory::MinIncreased => "min-increased",
            ChangeCategory::MinDecreased => "min-decreased",
            ChangeCategory::MaxIncreased => "max-increased",
            ChangeCategory::MaxDecreased => "max-decreased",
            ChangeCategory::Widened => "widened",
            ChangeCategory::Narrowed => "narrowed",
            ChangeCategory::Shifted => "shifted",
            ChangeCategory::UnitChanged => "unit-changed",
            ChangeCategory::Deprecated => "deprecated",
        };
        write!(f, "{label}")
    }
}

/// One recorded band change within a version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeChange {
    pub symbol: String,
    pub category: ChangeCategory,
    pub old: Option<IdealRange>,
    pub new: Option<IdealRange>,
    pub rationale: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// A versioned, immutable reference-range release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRangeVersion {
    /// Semantic-version id, e.g. "2.1.0"
    pub id: String,
    pub name: String,
    /// Laboratory standard the table derives from
    pub standard: String,
    pub created_at: DateTime<Utc>,
    pub effective_at: DateTime<Utc>,
    pub deprecated_at: Option<DateTime<Utc>>,
    /// Id of the version this one supersedes
    pub supersedes: Option<String>,
    /// Ordered change records relative to the superseded version
    pub changes: Vec<RangeChange>,
    /// Full immutable range snapshot
    pub table: RangeTable,
    pub active: bool,
}

/// Impact category of a symbol's change between two versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeImpact {
    None,
    /// Boundary moved by less than 10%
    Minor,
    /// Boundary moved by 10-20%
    Moderate,
    /// Boundary moved by 20% or more, or the symbol was added/removed
    Major,
}

impl std::fmt::Display for ChangeImpact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeImpact::None => write!(f, "none"),
            ChangeImpact::Minor => write!(f, "minor"),
            ChangeImpact::Moderate => write!(f, "moderate"),
            ChangeImpact::Major => write!(f, "major"),
        }
    }
}

/// Per-symbol result of comparing two versions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolChange {
    pub symbol: String,
    pub changed: bool,
    pub impact: ChangeImpact,
    pub old: Option<IdealRange>,
    pub new: Option<IdealRange>,
}

/// Full comparison between two versions, per symbol in deterministic order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionComparison {
    pub from_id: String,
    pub to_id: String,
    pub total_changes: usize,
    pub changes: Vec<SymbolChange>,
}

/// Relative boundary movement between two bands, as a fraction of the old
/// bound (worst of min and max).
fn boundary_move(old: &IdealRange, new: &IdealRange) -> f64 {
    let rel = |old_bound: f64, new_bound: f64| -> f64 {
        if old_bound == new_bound {
            0.0
        } else if old_bound == 0.0 {
            1.0
        } else {
            ((new_bound - old_bound) / old_bound).abs()
        }
    };
    rel(old.min, new.min).max(rel(old.max, new.max))
}

/// Impact category for one symbol across two tables.
fn impact_of(old: Option<&IdealRange>, new: Option<&IdealRange>) -> ChangeImpact {
    match (old, new) {
        (None, None) => ChangeImpact::None,
        (None, Some(_)) | (Some(_), None) => ChangeImpact::Major,
        (Some(old), Some(new)) => {
            if old == new {
                return ChangeImpact::None;
            }
            if old.unit != new.unit {
                return ChangeImpact::Major;
            }
            let moved = boundary_move(old, new);
            if moved >= 0.20 {
                ChangeImpact::Major
            } else if moved >= 0.10 {
                ChangeImpact::Moderate
            } else {
                ChangeImpact::Minor
            }
        }
    }
}

/// Compare two version tables symbol by symbol.
pub fn compare_tables(
    from: &ReferenceRangeVersion,
    to: &ReferenceRangeVersion,
) -> VersionComparison {
    let mut symbols: Vec<String> = from
        .table
        .symbols()
        .chain(to.table.symbols())
        .map(str::to_string)
        .collect();
    symbols.sort();
    symbols.dedup();

    let mut changes = Vec::with_capacity(symbols.len());
    let mut total_changes = 0;
    for symbol in symbols {
        let old = from.table.get(&symbol);
        let new = to.table.get(&symbol);
        let impact = impact_of(old, new);
        let changed = impact != ChangeImpact::None;
        if changed {
            total_changes += 1;
        }
        changes.push(SymbolChange {
            symbol,
            changed,
            impact,
            old: old.cloned(),
            new: new.cloned(),
        });
    }

    VersionComparison {
        from_id: from.id.clone(),
        to_id: to.id.clone(),
        total_changes,
        changes,
    }
}

/// Categorize one band edit for the change log.
fn categorize(old: &IdealRange, new: &IdealRange) -> ChangeCategory {
    if old.unit != new.unit {
        return ChangeCategory::UnitChanged;
    }
    let min_up = new.min > old.min;
    let min_down = new.min < old.min;
    let max_up = new.max > old.max;
    let max_down = new.max < old.max;
    match (min_up, min_down, max_up, max_down) {
        (false, true, true, false) => ChangeCategory::Widened,
        (true, false, false, true) => ChangeCategory::Narrowed,
        (true, false, true, false) | (false, true, false, true) => ChangeCategory::Shifted,
        (true, false, false, false) => ChangeCategory::MinIncreased,
        (false, true, false, false) => ChangeCategory::MinDecreased,
        (false, false, true, false) => ChangeCategory::MaxIncreased,
        (false, false, false, true) => ChangeCategory::MaxDecreased,
        _ => ChangeCategory::Shifted,
    }
}

/// Derive the ordered change log between a superseded table and its
/// successor. Symbols sort lexicographically; untouched symbols are omitted.
pub fn diff_tables(old: &RangeTable, new: &RangeTable, rationale: &str) -> Vec<RangeChange> {
    let mut symbols: Vec<String> = old
        .symbols()
        .chain(new.symbols())
        .map(str::to_string)
        .collect();
    symbols.sort();
    symbols.dedup();

    let mut changes = Vec::new();
    for symbol in symbols {
        let old_band = old.get(&symbol);
        let new_band = new.get(&symbol);
        let category = match (old_band, new_band) {
            (None, None) => continue,
            (None, Some(_)) => ChangeCategory::Created,
            (Some(_), None) => ChangeCategory::Deprecated,
            (Some(old_band), Some(new_band)) => {
                if old_band == new_band {
                    continue;
                }
                categorize(old_band, new_band)
            }
        };
        changes.push(RangeChange {
            symbol,
            category,
            old: old_band.cloned(),
            new: new_band.cloned(),
            rationale: rationale.to_string(),
            citations: Vec::new(),
        });
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ranges::builtin_table;

    fn version_with(table: RangeTable, id: &str) -> ReferenceRangeVersion {
        ReferenceRangeVersion {
            id: id.to_string(),
            name: format!("test {id}"),
            standard: "TEST".to_string(),
            created_at: Utc::now(),
            effective_at: Utc::now(),
            deprecated_at: None,
            supersedes: None,
            changes: Vec::new(),
            table,
            active: false,
        }
    }

    #[test]
    fn test_compare_identical_versions_has_no_changes() {
        let a = version_with(builtin_table(), "1.0.0");
        let b = version_with(builtin_table(), "1.0.0");
        let comparison = compare_tables(&a, &b);
        assert_eq!(comparison.total_changes, 0);
        assert!(comparison.changes.iter().all(|c| !c.changed));
        assert!(comparison
            .changes
            .iter()
            .all(|c| c.impact == ChangeImpact::None));
    }

    #[test]
    fn test_impact_thresholds() {
        let mut table = builtin_table();
        // Ca max 45 -> 47 is a 4.4% move: minor
        table.minerals.get_mut("Ca").expect("Ca").max = 47.0;
        let a = version_with(builtin_table(), "1.0.0");
        let b = version_with(table.clone(), "1.1.0");
        let comparison = compare_tables(&a, &b);
        let ca = comparison
            .changes
            .iter()
            .find(|c| c.symbol == "Ca")
            .expect("Ca change");
        assert!(ca.changed);
        assert_eq!(ca.impact, ChangeImpact::Minor);

        // Ca max 45 -> 52 is a 15.6% move: moderate
        table.minerals.get_mut("Ca").expect("Ca").max = 52.0;
        let b = version_with(table.clone(), "1.2.0");
        let ca = compare_tables(&a, &b)
            .changes
            .into_iter()
            .find(|c| c.symbol == "Ca")
            .expect("Ca change");
        assert_eq!(ca.impact, ChangeImpact::Moderate);

        // Ca max 45 -> 60 is a 33% move: major
        table.minerals.get_mut("Ca").expect("Ca").max = 60.0;
        let b = version_with(table, "1.3.0");
        let ca = compare_tables(&a, &b)
            .changes
            .into_iter()
            .find(|c| c.symbol == "Ca")
            .expect("Ca change");
        assert_eq!(ca.impact, ChangeImpact::Major);
    }

    #[test]
    fn test_added_and_removed_symbols_are_major() {
        let mut table = builtin_table();
        table.minerals.remove("Mo");
        table
            .minerals
            .insert("Li".to_string(), IdealRange::new(0.01, 0.05, "mg%"));
        let a = version_with(builtin_table(), "1.0.0");
        let b = version_with(table, "2.0.0");
        let comparison = compare_tables(&a, &b);
        for symbol in ["Mo", "Li"] {
            let change = comparison
                .changes
                .iter()
                .find(|c| c.symbol == symbol)
                .expect("change present");
            assert_eq!(change.impact, ChangeImpact::Major, "{symbol}");
        }
    }

    #[test]
    fn test_diff_categories() {
        let old = builtin_table();
        let mut new = builtin_table();
        new.minerals.get_mut("Ca").expect("Ca").min = 33.0;
        new.minerals.get_mut("Ca").expect("Ca").max = 47.0;
        new.minerals.get_mut("Mg").expect("Mg").min = 5.0;
        new.minerals.get_mut("Mg").expect("Mg").max = 7.0;
        new.minerals.get_mut("Na").expect("Na").min = 22.0;
        new.minerals.get_mut("Na").expect("Na").max = 32.0;
        new.minerals.get_mut("K").expect("K").max = 13.0;
        new.minerals.remove("Mo");

        let changes = diff_tables(&old, &new, "test revision");
        let category_for = |symbol: &str| {
            changes
                .iter()
                .find(|c| c.symbol == symbol)
                .map(|c| c.category)
                .expect("change present")
        };
        assert_eq!(category_for("Ca"), ChangeCategory::Widened);
        assert_eq!(category_for("Mg"), ChangeCategory::Narrowed);
        assert_eq!(category_for("Na"), ChangeCategory::Shifted);
        assert_eq!(category_for("K"), ChangeCategory::MaxIncreased);
        assert_eq!(category_for("Mo"), ChangeCategory::Deprecated);
        // Ordered by symbol
        let symbols: Vec<&str> = changes.iter().map(|c| c.symbol.as_str()).collect();
        let mut sorted = symbols.clone();
        sorted.sort();
        assert_eq!(symbols, sorted);
    }
}
