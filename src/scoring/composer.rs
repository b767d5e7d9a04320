//! Health score composition over a classified panel

use crate::config::Semantics;
use crate::models::{
    MineralMeasurement, RatioMeasurement, StatusCounts, PANEL_MINERALS, PANEL_RATIOS,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Multiplier below a range minimum that marks an extreme reading.
const EXTREME_LOW_FACTOR: f64 = 0.5;
/// Multiplier above a range maximum that marks an extreme reading.
const EXTREME_HIGH_FACTOR: f64 = 1.5;
/// Penalty points per extreme mineral reading.
const EXTREME_MINERAL_PENALTY: f64 = 2.0;
/// Penalty points per violated critical-ratio threshold.
const CRITICAL_RATIO_PENALTY: f64 = 1.0;

/// A raised red flag with its stable key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlag {
    /// Stable key used for delta attribution, e.g. "extreme-ca"
    pub key: String,
    pub detail: String,
}

/// Composite health score with full sub-score breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScoreBreakdown {
    /// Composite score, 0-100
    pub total: f64,
    pub grade: String,
    pub grade_interpretation: String,
    pub grade_color: String,
    pub mineral_score: f64,
    pub ratio_score: f64,
    pub red_flag_score: f64,
    /// Statuses across all 21 classified markers
    pub status_counts: StatusCounts,
    /// Human-readable descriptions of every raised flag
    pub critical_issues: Vec<String>,
    /// Raised flags with stable keys
    pub red_flags: Vec<RedFlag>,
    pub semantics_version: String,
}

/// Compose the health score for a classified panel. Pure: no side effects,
/// deterministic for a given panel and semantics table.
pub fn compose(
    minerals: &[MineralMeasurement],
    ratios: &[RatioMeasurement],
    semantics: &Semantics,
) -> HealthScoreBreakdown {
    let optimal_minerals = minerals.iter().filter(|m| !m.status.is_abnormal()).count();
    let optimal_ratios = ratios.iter().filter(|r| !r.status.is_abnormal()).count();

    let mineral_score =
        optimal_minerals as f64 / PANEL_MINERALS.len() as f64 * semantics.mineral_pool();
    let ratio_score = optimal_ratios as f64 / PANEL_RATIOS.len() as f64 * semantics.ratio_pool();

    let mut red_flags = Vec::new();
    let mut critical_issues = Vec::new();
    let mut penalty = 0.0;

    for measurement in minerals {
        let extreme_low = measurement.value < measurement.range.min * EXTREME_LOW_FACTOR;
        let extreme_high = measurement.value > measurement.range.max * EXTREME_HIGH_FACTOR;
        if !(extreme_low || extreme_high) {
            continue;
        }
        penalty += EXTREME_MINERAL_PENALTY;
        let side = if extreme_low { "below 50% of" } else { "above 150% of" };
        let bound = if extreme_low {
            measurement.range.min
        } else {
            measurement.range.max
        };
        let detail = format!(
            "{} reading {} is {} its ideal bound {}",
            measurement.symbol, measurement.value, side, bound
        );
        critical_issues.push(detail.clone());
        red_flags.push(RedFlag {
            key: format!("extreme-{}", measurement.symbol.to_lowercase()),
            detail,
        });
    }

    for rule in &semantics.critical_ratios {
        let Some(ratio) = ratios.iter().find(|r| r.key() == rule.ratio) else {
            continue;
        };
        if !rule.violated_by(ratio.value) {
            continue;
        }
        penalty += CRITICAL_RATIO_PENALTY;
        let detail = format!("{} at {:.2} marks a {}", rule.ratio, ratio.value, rule.label);
        critical_issues.push(detail.clone());
        red_flags.push(RedFlag {
            key: rule.key.to_string(),
            detail,
        });
    }

    let red_flag_score = (semantics.red_flag_pool() - penalty).max(0.0);
    let total = mineral_score + ratio_score + red_flag_score;
    let band = semantics.band_for(total);

    debug!(
        total,
        mineral_score, ratio_score, red_flag_score, flags = red_flags.len(), "score composed"
    );

    HealthScoreBreakdown {
        total,
        grade: band.grade.to_string(),
        grade_interpretation: band.interpretation.to_string(),
        grade_color: band.color.to_string(),
        mineral_score,
        ratio_score,
        red_flag_score,
        status_counts: StatusCounts::tally(
            minerals
                .iter()
                .map(|m| &m.status)
                .chain(ratios.iter().map(|r| &r.status)),
        ),
        critical_issues,
        red_flags,
        semantics_version: semantics.semantics_version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{builtin_table, classify_panel};
    use std::collections::BTreeMap;

    fn midpoint_panel() -> BTreeMap<String, f64> {
        let table = builtin_table();
        table
            .minerals
            .iter()
            .map(|(symbol, range)| (symbol.clone(), range.midpoint()))
            .collect()
    }

    fn score_panel(values: &BTreeMap<String, f64>) -> HealthScoreBreakdown {
        let table = builtin_table();
        let semantics = Semantics::load().expect("semantics");
        let (minerals, ratios) = classify_panel(values, &table);
        compose(&minerals, &ratios, semantics)
    }

    #[test]
    fn test_midpoint_panel_scores_100() {
        let breakdown = score_panel(&midpoint_panel());
        assert_eq!(breakdown.total, 100.0);
        assert_eq!(breakdown.grade, "A");
        assert_eq!(breakdown.mineral_score, 60.0);
        assert_eq!(breakdown.ratio_score, 30.0);
        assert_eq!(breakdown.red_flag_score, 10.0);
        assert!(breakdown.red_flags.is_empty());
        assert_eq!(breakdown.status_counts.optimal, 21);
    }

    #[test]
    fn test_abnormal_minerals_reduce_pool_share() {
        let mut values = midpoint_panel();
        // Far below the Zn buffer floor (15 x 0.7 = 10.5) but above the
        // extreme threshold (15 x 0.5 = 7.5): abnormal, not flagged.
        values.insert("Zn".to_string(), 8.0);
        let breakdown = score_panel(&values);
        assert_eq!(breakdown.mineral_score, 14.0 / 15.0 * 60.0);
        assert!(breakdown.red_flags.is_empty());
        // Zn/Cu = 8 / 2.5 = 3.2 drops below its band too
        assert!(breakdown.ratio_score < 30.0);
    }

    #[test]
    fn test_extreme_reading_raises_flag() {
        let mut values = midpoint_panel();
        values.insert("Fe".to_string(), 0.5); // below 1.5 x 0.5
        let breakdown = score_panel(&values);
        assert_eq!(breakdown.red_flag_score, 8.0);
        assert_eq!(breakdown.red_flags.len(), 1);
        assert_eq!(breakdown.red_flags[0].key, "extreme-fe");
        assert_eq!(breakdown.critical_issues.len(), 1);
    }

    #[test]
    fn test_critical_ratio_violation() {
        let mut values = midpoint_panel();
        // Na/K = 5/10 = 0.5 < 0.8: inversion flag. Na=5 is also an extreme
        // reading (below 20 x 0.5 = 10): 2 + 1 penalty points.
        values.insert("Na".to_string(), 5.0);
        let breakdown = score_panel(&values);
        assert_eq!(breakdown.red_flag_score, 7.0);
        let keys: Vec<&str> = breakdown.red_flags.iter().map(|f| f.key.as_str()).collect();
        assert!(keys.contains(&"extreme-na"));
        assert!(keys.contains(&"na-k-inversion"));
    }

    #[test]
    fn test_red_flag_score_never_negative() {
        // An all-zero panel: every mineral is extreme-low (0 < min x 0.5),
        // 15 x 2 = 30 penalty points, floor at 0.
        let values: BTreeMap<String, f64> = midpoint_panel()
            .keys()
            .map(|symbol| (symbol.clone(), 0.0))
            .collect();
        let breakdown = score_panel(&values);
        assert_eq!(breakdown.red_flag_score, 0.0);
        assert_eq!(breakdown.mineral_score, 0.0);
        assert_eq!(breakdown.grade, "F");
    }

    #[test]
    fn test_compose_is_deterministic() {
        let values = midpoint_panel();
        let a = score_panel(&values);
        let b = score_panel(&values);
        assert_eq!(a.total, b.total);
        assert_eq!(a.red_flags, b.red_flags);
    }
}
