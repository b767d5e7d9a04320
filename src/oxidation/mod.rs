//! Oxidation Pattern Classifier
//!
//! Rule-based metabolic-tendency inference over the four core minerals
//! (Ca, Mg, Na, K). Seven signals vote fast, slow, or neutral:
//!
//! ```text
//! Mineral signals (4)        Ratio signals (3)
//!   Ca  low->fast high->slow   Ca/K  below band->fast above->slow
//!   Mg  low->fast high->slow   Na/K  below band->slow above->fast
//!   Na  low->slow high->fast   Ca/Mg below band->fast above->slow
//!   K   low->slow high->fast
//! ```
//!
//! Resolution order: Balanced (>=3/4 mineral and >=2/3 ratio signals
//! neutral), then Mixed (both sides voting, within one vote), then a
//! strict majority of >=3 votes; anything unresolved lands on Mixed.
//! The label is a tendency, not a diagnosis.

use crate::models::{ratio_key, IdealRange, RangeKind, Status};
use crate::registry::{classify, RangeTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Relative distance to a band boundary that marks a borderline label.
const PROXIMITY_THRESHOLD: f64 = 0.05;

/// Metabolic-tendency archetype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OxidationArchetype {
    Fast,
    Slow,
    Mixed,
    Balanced,
}

impl std::fmt::Display for OxidationArchetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OxidationArchetype::Fast => write!(f, "fast"),
            OxidationArchetype::Slow => write!(f, "slow"),
            OxidationArchetype::Mixed => write!(f, "mixed"),
            OxidationArchetype::Balanced => write!(f, "balanced"),
        }
    }
}

/// Confidence in the archetype label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OxidationConfidence {
    High,
    Moderate,
    Low,
}

impl std::fmt::Display for OxidationConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OxidationConfidence::High => write!(f, "high"),
            OxidationConfidence::Moderate => write!(f, "moderate"),
            OxidationConfidence::Low => write!(f, "low"),
        }
    }
}

/// One signal's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalVote {
    Fast,
    Slow,
    Neutral,
}

/// A core-mineral indicator signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MineralSignal {
    pub symbol: String,
    pub value: f64,
    pub status: Status,
    pub vote: SignalVote,
}

/// A controlling-ratio signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioSignal {
    pub key: String,
    pub value: f64,
    pub band: IdealRange,
    pub vote: SignalVote,
}

/// Vote counts across all seven signals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub fast: usize,
    pub slow: usize,
    pub neutral: usize,
}

/// Raw metadata frozen alongside the classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OxidationMeta {
    pub ratio_values: BTreeMap<String, f64>,
    /// Signals aligned with the winning side, capped at 6
    pub alignment: usize,
    pub tally: VoteTally,
}

/// Full classification output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OxidationClassification {
    pub archetype: OxidationArchetype,
    pub confidence: OxidationConfidence,
    pub mineral_signals: Vec<MineralSignal>,
    pub ratio_signals: Vec<RatioSignal>,
    /// Deterministic explanation derived from the same signals that voted
    pub explanation: String,
    /// Borderline-label warnings for ratios near a band boundary
    pub warnings: Vec<String>,
    pub insufficient_data: bool,
    pub meta: OxidationMeta,
}

/// The four core mineral readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoreMinerals {
    pub calcium: f64,
    pub magnesium: f64,
    pub sodium: f64,
    pub potassium: f64,
}

impl CoreMinerals {
    /// Pull the core readings out of a raw panel; absent symbols read 0.
    pub fn from_values(values: &BTreeMap<String, f64>) -> Self {
        let get = |symbol: &str| values.get(symbol).copied().unwrap_or(0.0);
        Self {
            calcium: get("Ca"),
            magnesium: get("Mg"),
            sodium: get("Na"),
            potassium: get("K"),
        }
    }

    fn is_usable(&self) -> bool {
        self.calcium > 0.0 && self.magnesium > 0.0 && self.sodium > 0.0 && self.potassium > 0.0
    }
}

fn mineral_vote(symbol: &str, status: Status) -> SignalVote {
    match (symbol, status) {
        (_, Status::Optimal) => SignalVote::Neutral,
        // Tissue Ca/Mg accumulate as metabolism slows
        ("Ca" | "Mg", Status::High) => SignalVote::Slow,
        ("Ca" | "Mg", Status::Low) => SignalVote::Fast,
        // Na/K run high under a fast metabolic tempo
        ("Na" | "K", Status::High) => SignalVote::Fast,
        ("Na" | "K", Status::Low) => SignalVote::Slow,
        _ => SignalVote::Neutral,
    }
}

fn ratio_vote(key: &str, value: f64, band: &IdealRange) -> SignalVote {
    let status = classify(value, band, RangeKind::Ratio);
    match (key, status) {
        (_, Status::Optimal) => SignalVote::Neutral,
        ("Ca/K" | "Ca/Mg", Status::Low) => SignalVote::Fast,
        ("Ca/K" | "Ca/Mg", Status::High) => SignalVote::Slow,
        ("Na/K", Status::Low) => SignalVote::Slow,
        ("Na/K", Status::High) => SignalVote::Fast,
        _ => SignalVote::Neutral,
    }
}

fn vote_word(vote: SignalVote) -> &'static str {
    match vote {
        SignalVote::Fast => "fast",
        SignalVote::Slow => "slow",
        SignalVote::Neutral => "neutral",
    }
}

/// Classify the oxidation pattern from the four core minerals.
///
/// Never fails: missing, zero, or negative core input returns a
/// low-confidence Balanced fallback carrying an insufficient-data note.
pub fn classify_oxidation(core: &CoreMinerals, table: &RangeTable) -> OxidationClassification {
    if !core.is_usable() {
        return insufficient_fallback(core);
    }

    let readings = [
        ("Ca", core.calcium),
        ("Mg", core.magnesium),
        ("Na", core.sodium),
        ("K", core.potassium),
    ];

    let mut mineral_signals = Vec::with_capacity(4);
    for (symbol, value) in readings {
        let Some(range) = table.mineral(symbol) else {
            return insufficient_fallback(core);
        };
        let status = classify(value, range, RangeKind::Mineral);
        mineral_signals.push(MineralSignal {
            symbol: symbol.to_string(),
            value,
            status,
            vote: mineral_vote(symbol, status),
        });
    }

    let controlling = [
        ("Ca", "K", core.calcium / core.potassium),
        ("Na", "K", core.sodium / core.potassium),
        ("Ca", "Mg", core.calcium / core.magnesium),
    ];
    let mut ratio_signals = Vec::with_capacity(3);
    let mut warnings = Vec::new();
    for (num, den, value) in controlling {
        let key = ratio_key(num, den);
        let Some(band) = table.ratio(&key) else {
            return insufficient_fallback(core);
        };
        for bound in [band.min, band.max] {
            if bound > 0.0 && ((value - bound) / bound).abs() <= PROXIMITY_THRESHOLD {
                warnings.push(format!(
                    "{key} {value:.2} is within 5% of the {bound:.2} boundary; the label is borderline"
                ));
            }
        }
        ratio_signals.push(RatioSignal {
            key: key.clone(),
            value,
            band: band.clone(),
            vote: ratio_vote(&key, value, band),
        });
    }

    let tally = VoteTally {
        fast: count_votes(&mineral_signals, &ratio_signals, SignalVote::Fast),
        slow: count_votes(&mineral_signals, &ratio_signals, SignalVote::Slow),
        neutral: count_votes(&mineral_signals, &ratio_signals, SignalVote::Neutral),
    };
    let neutral_minerals = mineral_signals
        .iter()
        .filter(|s| s.vote == SignalVote::Neutral)
        .count();
    let neutral_ratios = ratio_signals
        .iter()
        .filter(|s| s.vote == SignalVote::Neutral)
        .count();

    let (archetype, aligned) = if neutral_minerals >= 3 && neutral_ratios >= 2 {
        (OxidationArchetype::Balanced, tally.neutral)
    } else if tally.fast > 0 && tally.slow > 0 && tally.fast.abs_diff(tally.slow) <= 1 {
        (OxidationArchetype::Mixed, tally.fast.max(tally.slow))
    } else if tally.fast >= 3 && tally.fast > tally.slow {
        (OxidationArchetype::Fast, tally.fast)
    } else if tally.slow >= 3 && tally.slow > tally.fast {
        (OxidationArchetype::Slow, tally.slow)
    } else {
        (OxidationArchetype::Mixed, tally.fast.max(tally.slow))
    };

    // Balanced confidence runs on a doubled scale: seven aligned signals
    // are possible, six mark strong agreement.
    let confidence = match archetype {
        OxidationArchetype::Balanced => {
            if aligned >= 6 {
                OxidationConfidence::High
            } else if aligned >= 4 {
                OxidationConfidence::Moderate
            } else {
                OxidationConfidence::Low
            }
        }
        _ => {
            if aligned >= 4 {
                OxidationConfidence::High
            } else if aligned >= 2 {
                OxidationConfidence::Moderate
            } else {
                OxidationConfidence::Low
            }
        }
    };

    let explanation = build_explanation(
        &mineral_signals,
        &ratio_signals,
        tally,
        archetype,
        confidence,
    );
    let ratio_values = ratio_signals
        .iter()
        .map(|s| (s.key.clone(), s.value))
        .collect();

    debug!(%archetype, %confidence, fast = tally.fast, slow = tally.slow, "oxidation classified");

    OxidationClassification {
        archetype,
        confidence,
        mineral_signals,
        ratio_signals,
        explanation,
        warnings,
        insufficient_data: false,
        meta: OxidationMeta {
            ratio_values,
            alignment: aligned.min(6),
            tally,
        },
    }
}

fn count_votes(minerals: &[MineralSignal], ratios: &[RatioSignal], vote: SignalVote) -> usize {
    minerals.iter().filter(|s| s.vote == vote).count()
        + ratios.iter().filter(|s| s.vote == vote).count()
}

/// The explanation is rendered from the same signal values that voted, so
/// label and narrative cannot drift apart.
fn build_explanation(
    minerals: &[MineralSignal],
    ratios: &[RatioSignal],
    tally: VoteTally,
    archetype: OxidationArchetype,
    confidence: OxidationConfidence,
) -> String {
    let mineral_part: Vec<String> = minerals
        .iter()
        .map(|s| format!("{} {} {}", s.symbol, s.value, s.status))
        .collect();
    let ratio_part: Vec<String> = ratios
        .iter()
        .map(|s| {
            let position = if s.value < s.band.min {
                format!("below {:.2}", s.band.min)
            } else if s.value > s.band.max {
                format!("above {:.2}", s.band.max)
            } else {
                format!("within {:.2}-{:.2}", s.band.min, s.band.max)
            };
            format!("{} {:.2} {} ({})", s.key, s.value, position, vote_word(s.vote))
        })
        .collect();
    format!(
        "{} | {} | votes: {} fast, {} slow, {} neutral -> {} ({} confidence)",
        mineral_part.join("; "),
        ratio_part.join("; "),
        tally.fast,
        tally.slow,
        tally.neutral,
        archetype,
        confidence
    )
}

fn insufficient_fallback(core: &CoreMinerals) -> OxidationClassification {
    let explanation = format!(
        "insufficient data: core readings Ca {}, Mg {}, Na {}, K {} do not support \
         classification; defaulting to balanced at low confidence",
        core.calcium, core.magnesium, core.sodium, core.potassium
    );
    OxidationClassification {
        archetype: OxidationArchetype::Balanced,
        confidence: OxidationConfidence::Low,
        mineral_signals: Vec::new(),
        ratio_signals: Vec::new(),
        explanation,
        warnings: Vec::new(),
        insufficient_data: true,
        meta: OxidationMeta {
            ratio_values: BTreeMap::new(),
            alignment: 0,
            tally: VoteTally::default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::builtin_table;

    fn classify_values(ca: f64, mg: f64, na: f64, k: f64) -> OxidationClassification {
        let core = CoreMinerals {
            calcium: ca,
            magnesium: mg,
            sodium: na,
            potassium: k,
        };
        classify_oxidation(&core, &builtin_table())
    }

    #[test]
    fn test_midpoint_panel_is_balanced_high() {
        let table = builtin_table();
        let mid = |s: &str| table.mineral(s).expect("band").midpoint();
        let classification = classify_values(mid("Ca"), mid("Mg"), mid("Na"), mid("K"));
        assert_eq!(classification.archetype, OxidationArchetype::Balanced);
        assert_eq!(classification.confidence, OxidationConfidence::High);
        assert_eq!(classification.meta.tally.neutral, 7);
        assert_eq!(classification.meta.alignment, 6);
        assert!(classification.warnings.is_empty());
    }

    #[test]
    fn test_worked_scenario_traces_to_balanced_high() {
        // Ca=50 Mg=6 Na=20 K=12: all four minerals inside buffer zones;
        // Ca/K 4.17 neutral, Na/K 1.67 below 1.8 (slow), Ca/Mg 8.33 neutral.
        let classification = classify_values(50.0, 6.0, 20.0, 12.0);
        assert_eq!(classification.meta.tally.fast, 0);
        assert_eq!(classification.meta.tally.slow, 1);
        assert_eq!(classification.meta.tally.neutral, 6);
        assert_eq!(classification.archetype, OxidationArchetype::Balanced);
        assert_eq!(classification.confidence, OxidationConfidence::High);

        let na_k = classification
            .ratio_signals
            .iter()
            .find(|s| s.key == "Na/K")
            .expect("Na/K signal");
        assert_eq!(na_k.vote, SignalVote::Slow);
        assert!((na_k.value - 1.6667).abs() < 1e-3);
        assert!(classification.explanation.contains("Na/K 1.67 below 1.80"));
        assert!(classification.explanation.contains("balanced"));
    }

    #[test]
    fn test_fast_pattern() {
        // Low Ca/Mg, high Na/K: the classic fast signature.
        let classification = classify_values(20.0, 2.5, 45.0, 18.0);
        assert_eq!(classification.archetype, OxidationArchetype::Fast);
        assert_eq!(classification.confidence, OxidationConfidence::High);
        assert!(classification.meta.tally.fast >= 4);
    }

    #[test]
    fn test_slow_pattern() {
        let classification = classify_values(80.0, 12.0, 10.0, 4.0);
        assert_eq!(classification.archetype, OxidationArchetype::Slow);
        assert_eq!(classification.confidence, OxidationConfidence::High);
    }

    #[test]
    fn test_mixed_pattern() {
        // High Ca votes slow, high Na votes fast; ratio votes split too.
        let classification = classify_values(80.0, 6.0, 45.0, 10.0);
        assert_eq!(classification.meta.tally.fast, 2);
        assert_eq!(classification.meta.tally.slow, 3);
        assert_eq!(classification.archetype, OxidationArchetype::Mixed);
        assert_eq!(classification.confidence, OxidationConfidence::Moderate);
    }

    #[test]
    fn test_insufficient_data_falls_back() {
        let classification = classify_values(40.0, 6.0, 25.0, 0.0);
        assert_eq!(classification.archetype, OxidationArchetype::Balanced);
        assert_eq!(classification.confidence, OxidationConfidence::Low);
        assert!(classification.insufficient_data);
        assert!(classification.explanation.contains("insufficient data"));

        let negative = classify_values(40.0, -1.0, 25.0, 10.0);
        assert!(negative.insufficient_data);
    }

    #[test]
    fn test_borderline_ratio_raises_warning() {
        // Na/K = 21.5 / 12 = 1.79, within 5% of the 1.80 boundary.
        let classification = classify_values(40.0, 6.0, 21.5, 12.0);
        assert!(
            classification.warnings.iter().any(|w| w.contains("Na/K")),
            "expected a Na/K proximity warning, got {:?}",
            classification.warnings
        );
    }

    #[test]
    fn test_explanation_matches_signals() {
        let classification = classify_values(80.0, 12.0, 10.0, 4.0);
        for signal in &classification.mineral_signals {
            assert!(
                classification.explanation.contains(&signal.symbol),
                "explanation missing {}",
                signal.symbol
            );
        }
        assert!(classification
            .explanation
            .contains(&format!("{}", classification.archetype)));
    }
}
