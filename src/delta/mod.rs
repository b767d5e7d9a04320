//! Score Delta Explainer
//!
//! Attributes the score change between two analyses to named drivers, so
//! that every point of movement has a cause a reader can point at.
//!
//! # Attribution model
//!
//! Each category owns a fixed point pool (minerals 60, ratios 30, red
//! flags 10) divided evenly across its tracked items. A driver's impact is
//!
//! ```text
//! impact = share x (distance(prior) - distance(new))
//!          where distance(Optimal) = 0, distance(Low | High) = 1
//! ```
//!
//! plus a quarter-share "limiter" term when a marker stays abnormal in
//! both analyses, signed by whether the raw value drifted toward or away
//! from its band. The model is antisymmetric by construction: swapping the
//! analyses negates every impact, and identical inputs produce none.
//!
//! Statuses are classified through the registry's range table; the
//! explainer embeds no table of its own.

use crate::config::Semantics;
use crate::models::{ratio_key, AnalysisState, RangeKind, Status, PANEL_MINERALS, PANEL_RATIOS};
use crate::registry::{classify, classify_panel, RangeTable};
use crate::scoring::compose;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of drivers surfaced in the ranked list.
const TOP_DRIVER_COUNT: usize = 6;

/// What kind of marker a driver points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverCategory {
    Mineral,
    Ratio,
    RedFlag,
}

impl std::fmt::Display for DriverCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverCategory::Mineral => write!(f, "mineral"),
            DriverCategory::Ratio => write!(f, "ratio"),
            DriverCategory::RedFlag => write!(f, "red-flag"),
        }
    }
}

/// Net direction of one driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverDirection {
    Improved,
    Worsened,
    Unchanged,
}

/// One named cause of score movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaDriver {
    pub category: DriverCategory,
    pub key: String,
    /// Status in the prior analysis (red flags map absent -> optimal,
    /// present -> high)
    pub prior_status: Status,
    pub new_status: Status,
    pub direction: DriverDirection,
    /// Signed impact points
    pub impact: f64,
    pub note: String,
}

/// Explained score change between two analyses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDeltaExplanation {
    /// new score - prior score
    pub delta: f64,
    pub headline: String,
    pub summary: String,
    /// Top drivers by absolute impact (nonzero only)
    pub top_drivers: Vec<DeltaDriver>,
    /// Every tracked driver in deterministic order
    pub drivers: Vec<DeltaDriver>,
    pub engine_version: String,
    pub semantics_version: String,
}

/// Reduce a raw panel to the analysis state the explainer consumes.
pub fn state_from_panel(
    values: &std::collections::BTreeMap<String, f64>,
    table: &RangeTable,
    semantics: &Semantics,
) -> AnalysisState {
    let (minerals, ratios) = classify_panel(values, table);
    let breakdown = compose(&minerals, &ratios, semantics);
    AnalysisState {
        measurements: values.clone(),
        ratios: ratios.iter().map(|r| (r.key(), r.value)).collect(),
        score: breakdown.total,
        flags: breakdown.red_flags.into_iter().map(|f| f.key).collect(),
    }
}

fn status_distance(status: Status) -> f64 {
    if status.is_abnormal() {
        1.0
    } else {
        0.0
    }
}

fn direction_for(impact: f64) -> DriverDirection {
    if impact > 0.0 {
        DriverDirection::Improved
    } else if impact < 0.0 {
        DriverDirection::Worsened
    } else {
        DriverDirection::Unchanged
    }
}

/// Impact and note for one marker tracked in both analyses.
fn marker_driver(
    category: DriverCategory,
    key: &str,
    prior_value: f64,
    new_value: f64,
    band: &crate::models::IdealRange,
    kind: RangeKind,
    share: f64,
) -> DeltaDriver {
    let prior_status = classify(prior_value, band, kind);
    let new_status = classify(new_value, band, kind);

    let (impact, note) = if prior_status == new_status {
        if prior_status.is_abnormal() {
            // Limiter: still abnormal; a quarter share tracks raw drift.
            let prior_distance = band.distance(prior_value);
            let new_distance = band.distance(new_value);
            if new_distance < prior_distance {
                (
                    share / 4.0,
                    format!("{key} still {new_status}, drifting toward its band"),
                )
            } else if new_distance > prior_distance {
                (
                    -share / 4.0,
                    format!("{key} still {new_status}, drifting further from its band"),
                )
            } else {
                (0.0, format!("{key} {new_status} in both analyses"))
            }
        } else {
            (0.0, format!("{key} optimal in both analyses"))
        }
    } else {
        let impact = share * (status_distance(prior_status) - status_distance(new_status));
        let note = if impact > 0.0 {
            format!("{key} recovered from {prior_status} into the optimal band")
        } else if impact < 0.0 {
            format!("{key} left the optimal band and reads {new_status}")
        } else {
            // Low -> High or High -> Low: crossed the band without landing
            format!("{key} swung from {prior_status} to {new_status} across the band")
        };
        (impact, note)
    };

    DeltaDriver {
        category,
        key: key.to_string(),
        prior_status,
        new_status,
        direction: direction_for(impact),
        impact,
        note,
    }
}

/// Explain the score change from `prior` to `new`.
pub fn explain_score_delta(
    prior: &AnalysisState,
    new: &AnalysisState,
    table: &RangeTable,
    semantics: &Semantics,
) -> ScoreDeltaExplanation {
    let mut drivers = Vec::new();

    let mineral_share = semantics.mineral_pool() / PANEL_MINERALS.len() as f64;
    for symbol in PANEL_MINERALS {
        let Some(band) = table.mineral(symbol) else {
            continue;
        };
        drivers.push(marker_driver(
            DriverCategory::Mineral,
            symbol,
            prior.measurements.get(symbol).copied().unwrap_or(0.0),
            new.measurements.get(symbol).copied().unwrap_or(0.0),
            band,
            RangeKind::Mineral,
            mineral_share,
        ));
    }

    let ratio_share = semantics.ratio_pool() / PANEL_RATIOS.len() as f64;
    for (num, den) in PANEL_RATIOS {
        let key = ratio_key(num, den);
        let Some(band) = table.ratio(&key) else {
            continue;
        };
        drivers.push(marker_driver(
            DriverCategory::Ratio,
            &key,
            prior.ratios.get(&key).copied().unwrap_or(0.0),
            new.ratios.get(&key).copied().unwrap_or(0.0),
            band,
            RangeKind::Ratio,
            ratio_share,
        ));
    }

    // Red flags attribute by presence change, sharing the flag pool evenly
    // across the union of flags either analysis raised.
    let mut flag_keys: Vec<String> = prior
        .flags
        .iter()
        .chain(new.flags.iter())
        .cloned()
        .collect();
    flag_keys.sort();
    flag_keys.dedup();
    if !flag_keys.is_empty() {
        let flag_share = semantics.red_flag_pool() / flag_keys.len() as f64;
        for key in flag_keys {
            let was_raised = prior.flags.contains(&key);
            let is_raised = new.flags.contains(&key);
            let (impact, prior_status, new_status, note) = match (was_raised, is_raised) {
                (true, false) => (
                    flag_share,
                    Status::High,
                    Status::Optimal,
                    format!("red flag {key} resolved"),
                ),
                (false, true) => (
                    -flag_share,
                    Status::Optimal,
                    Status::High,
                    format!("red flag {key} raised"),
                ),
                _ => (
                    0.0,
                    Status::High,
                    Status::High,
                    format!("red flag {key} present in both analyses"),
                ),
            };
            drivers.push(DeltaDriver {
                category: DriverCategory::RedFlag,
                key,
                prior_status,
                new_status,
                direction: direction_for(impact),
                impact,
                note,
            });
        }
    }

    let delta = new.score - prior.score;
    let top_drivers = rank_drivers(&drivers);
    let headline = headline_for(delta, prior.score, new.score);
    let summary = summary_for(&drivers, &top_drivers);

    debug!(delta, drivers = drivers.len(), top = top_drivers.len(), "delta explained");

    ScoreDeltaExplanation {
        delta,
        headline,
        summary,
        top_drivers,
        drivers,
        engine_version: crate::config::ENGINE_VERSION.to_string(),
        semantics_version: semantics.semantics_version.to_string(),
    }
}

/// Rank by absolute impact; ties break by category priority (mineral,
/// ratio, red-flag), then key. Zero-impact drivers never rank.
fn rank_drivers(drivers: &[DeltaDriver]) -> Vec<DeltaDriver> {
    let mut ranked: Vec<DeltaDriver> = drivers
        .iter()
        .filter(|d| d.impact != 0.0)
        .cloned()
        .collect();
    ranked.sort_by(|a, b| {
        b.impact
            .abs()
            .partial_cmp(&a.impact.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.category.cmp(&b.category))
            .then(a.key.cmp(&b.key))
    });
    ranked.truncate(TOP_DRIVER_COUNT);
    ranked
}

fn headline_for(delta: f64, prior_score: f64, new_score: f64) -> String {
    if delta > 0.0 {
        format!(
            "Score improved by {:.1} points ({:.1} -> {:.1})",
            delta, prior_score, new_score
        )
    } else if delta < 0.0 {
        format!(
            "Score declined by {:.1} points ({:.1} -> {:.1})",
            -delta, prior_score, new_score
        )
    } else {
        format!("Score unchanged at {prior_score:.1}")
    }
}

fn summary_for(drivers: &[DeltaDriver], ranked: &[DeltaDriver]) -> String {
    let improved = drivers
        .iter()
        .filter(|d| d.direction == DriverDirection::Improved)
        .count();
    let worsened = drivers
        .iter()
        .filter(|d| d.direction == DriverDirection::Worsened)
        .count();
    match ranked.first() {
        Some(lead) => format!(
            "{improved} markers improved and {worsened} worsened; largest driver: {} ({:+.1} pts)",
            lead.key, lead.impact
        ),
        None => "No tracked marker moved between the analyses".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::builtin_table;
    use std::collections::BTreeMap;

    fn semantics() -> &'static Semantics {
        Semantics::load().expect("semantics")
    }

    fn midpoint_values() -> BTreeMap<String, f64> {
        builtin_table()
            .minerals
            .iter()
            .map(|(symbol, range)| (symbol.clone(), range.midpoint()))
            .collect()
    }

    fn state(values: &BTreeMap<String, f64>) -> AnalysisState {
        state_from_panel(values, &builtin_table(), semantics())
    }

    #[test]
    fn test_identical_analyses_explain_to_zero() {
        let a = state(&midpoint_values());
        let explanation = explain_score_delta(&a, &a, &builtin_table(), semantics());
        assert_eq!(explanation.delta, 0.0);
        assert!(explanation.drivers.iter().all(|d| d.impact == 0.0));
        assert!(explanation.top_drivers.is_empty());
    }

    #[test]
    fn test_identical_abnormal_analyses_explain_to_zero() {
        // The limiter term must vanish when values are numerically equal,
        // even while statuses stay abnormal.
        let mut values = midpoint_values();
        values.insert("Zn".to_string(), 8.0);
        values.insert("Fe".to_string(), 0.5);
        let a = state(&values);
        let explanation = explain_score_delta(&a, &a, &builtin_table(), semantics());
        assert_eq!(explanation.delta, 0.0);
        assert!(explanation.drivers.iter().all(|d| d.impact == 0.0));
    }

    #[test]
    fn test_symmetry_negates_impacts_and_swaps_statuses() {
        let mut values_a = midpoint_values();
        values_a.insert("Zn".to_string(), 8.0); // low
        values_a.insert("Na".to_string(), 5.0); // extreme low + inversion flag
        let mut values_b = midpoint_values();
        values_b.insert("Fe".to_string(), 5.0); // extreme high

        let a = state(&values_a);
        let b = state(&values_b);
        let forward = explain_score_delta(&a, &b, &builtin_table(), semantics());
        let backward = explain_score_delta(&b, &a, &builtin_table(), semantics());

        assert_eq!(forward.delta, -backward.delta);
        assert_eq!(forward.drivers.len(), backward.drivers.len());
        for (f, r) in forward.drivers.iter().zip(backward.drivers.iter()) {
            assert_eq!(f.key, r.key);
            assert_eq!(f.impact, -r.impact, "impact sign for {}", f.key);
            assert_eq!(f.prior_status, r.new_status, "from/to swap for {}", f.key);
            assert_eq!(f.new_status, r.prior_status, "from/to swap for {}", f.key);
        }
    }

    #[test]
    fn test_recovered_mineral_earns_full_share() {
        let mut values_a = midpoint_values();
        values_a.insert("Zn".to_string(), 8.0);
        let values_b = midpoint_values();

        let explanation =
            explain_score_delta(&state(&values_a), &state(&values_b), &builtin_table(), semantics());
        let zn = explanation
            .drivers
            .iter()
            .find(|d| d.key == "Zn")
            .expect("Zn driver");
        assert_eq!(zn.impact, 4.0); // 60-point pool over 15 minerals
        assert_eq!(zn.direction, DriverDirection::Improved);
        assert_eq!(zn.prior_status, Status::Low);
        assert_eq!(zn.new_status, Status::Optimal);
    }

    #[test]
    fn test_limiter_quarter_share() {
        let mut values_a = midpoint_values();
        values_a.insert("Zn".to_string(), 8.0);
        let mut values_b = midpoint_values();
        values_b.insert("Zn".to_string(), 9.0); // still low, drifting up

        let explanation =
            explain_score_delta(&state(&values_a), &state(&values_b), &builtin_table(), semantics());
        let zn = explanation
            .drivers
            .iter()
            .find(|d| d.key == "Zn")
            .expect("Zn driver");
        assert_eq!(zn.impact, 1.0); // quarter of the 4-point share
        assert_eq!(zn.direction, DriverDirection::Improved);
        assert!(zn.note.contains("still low"));
    }

    #[test]
    fn test_resolved_flag_attribution() {
        let mut values_a = midpoint_values();
        values_a.insert("Fe".to_string(), 0.5); // extreme-fe flag
        let values_b = midpoint_values();

        let a = state(&values_a);
        let b = state(&values_b);
        assert_eq!(a.flags, vec!["extreme-fe".to_string()]);
        let explanation = explain_score_delta(&a, &b, &builtin_table(), semantics());
        let flag = explanation
            .drivers
            .iter()
            .find(|d| d.category == DriverCategory::RedFlag)
            .expect("flag driver");
        assert_eq!(flag.key, "extreme-fe");
        // Sole flag in the union takes the whole 10-point pool
        assert_eq!(flag.impact, 10.0);
        assert_eq!(flag.prior_status, Status::High);
        assert_eq!(flag.new_status, Status::Optimal);
    }

    #[test]
    fn test_top_drivers_ranked_and_capped() {
        let mut values_a = midpoint_values();
        for symbol in ["Zn", "Fe", "Mn", "Cr", "Se", "B", "Co"] {
            values_a.insert(symbol.to_string(), 0.001);
        }
        let values_b = midpoint_values();

        let explanation =
            explain_score_delta(&state(&values_a), &state(&values_b), &builtin_table(), semantics());
        assert_eq!(explanation.top_drivers.len(), 6);
        for pair in explanation.top_drivers.windows(2) {
            assert!(pair[0].impact.abs() >= pair[1].impact.abs());
        }
        // Equal-impact drivers tie-break by category then key
        let equal_run: Vec<&DeltaDriver> = explanation
            .top_drivers
            .iter()
            .filter(|d| d.impact.abs() == explanation.top_drivers[0].impact.abs())
            .collect();
        for pair in equal_run.windows(2) {
            assert!(
                (pair[0].category, &pair[0].key) <= (pair[1].category, &pair[1].key),
                "tie order violated: {:?} before {:?}",
                pair[0].key,
                pair[1].key
            );
        }
        assert!(explanation.delta > 0.0);
        assert!(explanation.headline.contains("improved"));
    }

    #[test]
    fn test_missing_reading_classifies_as_zero() {
        // A symbol absent from one analysis reads 0 there: Low, and the
        // driver records a recovery when it appears.
        let mut values_a = midpoint_values();
        values_a.remove("Se");
        let values_b = midpoint_values();
        let explanation =
            explain_score_delta(&state(&values_a), &state(&values_b), &builtin_table(), semantics());
        let se = explanation
            .drivers
            .iter()
            .find(|d| d.key == "Se")
            .expect("Se driver");
        assert_eq!(se.prior_status, Status::Low);
        assert_eq!(se.new_status, Status::Optimal);
    }
}
