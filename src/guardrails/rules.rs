//! The content policy as an ordered rule table
//!
//! Policy lives here as data (pattern, action, softener) so it can be
//! extended and tested without touching the gate's control flow. Rules
//! apply in table order; the first Drop match wins.

use regex::Regex;
use std::sync::OnceLock;

/// What a matching rule does to an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Remove the item entirely and count it
    Drop,
    /// Keep the item, prefixed with a softening phrase
    Soften,
}

/// One ordered content-policy rule
pub struct PolicyRule {
    /// Stable rule name used in action traces
    pub name: &'static str,
    pub action: RuleAction,
    pub pattern: Regex,
}

static POLICY_RULES: OnceLock<Vec<PolicyRule>> = OnceLock::new();

/// The ordered policy table. Forbidden-scope rules run first, then
/// diagnostic/prescriptive verbs, then softer risk patterns.
pub fn policy_rules() -> &'static Vec<PolicyRule> {
    POLICY_RULES.get_or_init(|| {
        vec![
            // Forbidden scope: named disease categories
            PolicyRule {
                name: "forbidden-disease-scope",
                action: RuleAction::Drop,
                pattern: Regex::new(concat!(
                    r"(?i)\b(cancer|tumou?r|diabet(es|ic)|heart disease|cardiovascular disease",
                    r"|thyroid (disease|disorder|condition)|alzheimer'?s?|dementia|depression",
                    r"|anxiety disorder|arthritis|autoimmune|kidney disease|liver disease",
                    r"|osteoporosis)\b"
                ))
                .expect("valid forbidden-disease pattern"),
            },
            // Forbidden scope: protected populations
            PolicyRule {
                name: "forbidden-population-scope",
                action: RuleAction::Drop,
                pattern: Regex::new(concat!(
                    r"(?i)\b(pregnan(t|cy)|breastfeeding|nursing mother|infant|newborn",
                    r"|toddler|child(ren)?|pediatric|paediatric)\b"
                ))
                .expect("valid forbidden-population pattern"),
            },
            // Diagnostic / prescriptive verbs
            PolicyRule {
                name: "diagnostic-verb",
                action: RuleAction::Drop,
                pattern: Regex::new(concat!(
                    r"(?i)\b(diagnos(e|es|ed|ing|is|tic)|cur(e|es|ed|ing)",
                    r"|treat(s|ed|ing|ment|ments)?|prescrib(e|es|ed|ing)|prescription)\b"
                ))
                .expect("valid diagnostic-verb pattern"),
            },
            // Softer risk: absolute claims and guarantees
            PolicyRule {
                name: "absolute-claim",
                action: RuleAction::Soften,
                pattern: Regex::new(concat!(
                    r"(?i)\b(always|never|guarantee[ds]?|definitely|certainly",
                    r"|will (fix|resolve|eliminate|restore)",
                    r"|completely (fix|resolve|eliminate))\b",
                    r"|\b100\s?%"
                ))
                .expect("valid absolute-claim pattern"),
            },
            // Softer risk: dosage-like tokens
            PolicyRule {
                name: "dosage-token",
                action: RuleAction::Soften,
                pattern: dosage_pattern().clone(),
            },
            // Softer risk: fixed timelines
            PolicyRule {
                name: "fixed-timeline",
                action: RuleAction::Soften,
                pattern: timeline_pattern().clone(),
            },
        ]
    })
}

static DOSAGE_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Amount + unit token, e.g. "200 mg" or "50mcg".
pub fn dosage_pattern() -> &'static Regex {
    DOSAGE_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b\d+(?:\.\d+)?\s?(?:mg|mcg|g|iu|milligrams?|micrograms?)\b")
            .expect("valid dosage pattern")
    })
}

static TIMELINE_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Fixed-timeline token, e.g. "within 3 weeks".
pub fn timeline_pattern() -> &'static Regex {
    TIMELINE_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:within|in|after)\s+\d+\s+(?:days?|weeks?|months?)\b")
            .expect("valid timeline pattern")
    })
}

/// Softening prefix applied by Soften rules.
pub const SOFTENING_PREFIX: &str = "Worth discussing with your practitioner: ";

/// Cautious prefix forced when the caller supplies no supporting evidence.
pub const LIMITED_DATA_PREFIX: &str = "Based on limited data: ";

/// Placeholder for dosage tokens in consumer output.
pub const DOSAGE_PLACEHOLDER: &str = "an appropriate amount";

/// Placeholder for fixed timelines in consumer output.
pub const TIMELINE_PLACEHOLDER: &str = "over time";

/// Markers at least one of which any engine-authored phrasing must carry.
pub const SAFE_LANGUAGE_MARKERS: [&str; 7] = [
    "may", "might", "could", "consider", "worth", "support", "practitioner",
];

/// Development-time canary: engine-authored policy text (softeners,
/// placeholders) must itself use allowed safe language. Hard-fails in
/// debug builds only; the production path never raises.
pub fn debug_check_policy_language() {
    if cfg!(debug_assertions) {
        for text in [SOFTENING_PREFIX, LIMITED_DATA_PREFIX] {
            let lowered = text.to_lowercase();
            debug_assert!(
                SAFE_LANGUAGE_MARKERS
                    .iter()
                    .any(|marker| lowered.contains(marker))
                    || lowered.starts_with("based on"),
                "policy phrasing lacks safe-language markers: {text}"
            );
        }
    }
}
