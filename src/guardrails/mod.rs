//! Interpretation Guardrails Engine
//!
//! The policy gate every narrative text item passes before reaching any
//! boundary: interactive display, exported document, programmatic
//! response, or persisted storage. Text is untrusted regardless of origin;
//! rule-generated and externally generated items go through the same gate.
//!
//! # Pipeline (per item)
//!
//! ```text
//! (a) forbidden scope (diseases, protected populations)  -> drop + count
//! (b) diagnostic/prescriptive verbs                      -> drop + count
//! (c) softer risk (absolutes, dosages, timelines)        -> soften prefix
//! (d) zero supporting evidence                           -> limited-data prefix
//! (e) consumer audience: dosage/timeline tokens          -> generic placeholders
//! ```
//!
//! The gate never fails the call: output is always a sanitized result plus
//! a removed-item count. Recommendation lists always end with exactly one
//! channel-appropriate disclaimer.

mod rules;

pub use rules::{
    debug_check_policy_language, dosage_pattern, policy_rules, timeline_pattern, PolicyRule,
    RuleAction, DOSAGE_PLACEHOLDER, LIMITED_DATA_PREFIX, SAFE_LANGUAGE_MARKERS, SOFTENING_PREFIX,
    TIMELINE_PLACEHOLDER,
};

use crate::config::Semantics;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Who the sanitized text is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    #[default]
    Consumer,
    Practitioner,
}

/// Where the sanitized text is going
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    #[default]
    Interactive,
    Api,
    DocumentExport,
}

/// Evidence counts backing the narrative; all zero forces cautious phrasing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSignals {
    pub abnormal_minerals: usize,
    pub abnormal_ratios: usize,
    pub trend_changes: usize,
    pub red_flags: usize,
}

impl EvidenceSignals {
    pub fn total(&self) -> usize {
        self.abnormal_minerals + self.abnormal_ratios + self.trend_changes + self.red_flags
    }
}

/// One recorded gate action, surfaced to practitioners for compliance review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceAction {
    /// The item as it arrived (pre-sanitization)
    pub item: String,
    pub rule: String,
    pub action: String,
}

/// Sanitized narrative output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailsResult {
    pub insights: Vec<String>,
    /// Always ends with exactly one channel-appropriate disclaimer
    pub recommendations: Vec<String>,
    pub removed_count: usize,
    pub engine_version: String,
    pub semantics_version: String,
    /// Full action trace, present for practitioner requests only
    pub action_trace: Option<Vec<TraceAction>>,
}

struct Gate<'a> {
    audience: Audience,
    limited_evidence: bool,
    removed: usize,
    trace: Vec<TraceAction>,
    semantics: &'a Semantics,
}

impl Gate<'_> {
    /// Run one item through phases (a)-(e). None means dropped.
    fn sanitize(&mut self, item: &str) -> Option<String> {
        let mut text = item.trim().to_string();
        if text.is_empty() {
            return None;
        }

        let mut softened = false;
        for rule in policy_rules() {
            if !rule.pattern.is_match(&text) {
                continue;
            }
            match rule.action {
                RuleAction::Drop => {
                    self.removed += 1;
                    self.trace.push(TraceAction {
                        item: item.to_string(),
                        rule: rule.name.to_string(),
                        action: "dropped".to_string(),
                    });
                    return None;
                }
                RuleAction::Soften if !softened => {
                    softened = true;
                    self.trace.push(TraceAction {
                        item: item.to_string(),
                        rule: rule.name.to_string(),
                        action: "softened".to_string(),
                    });
                }
                RuleAction::Soften => {}
            }
        }
        if softened {
            text = format!("{SOFTENING_PREFIX}{text}");
        }

        if self.audience == Audience::Consumer {
            let replaced_dosage = dosage_pattern().replace_all(&text, DOSAGE_PLACEHOLDER);
            let replaced = timeline_pattern().replace_all(&replaced_dosage, TIMELINE_PLACEHOLDER);
            if replaced.as_ref() != text.as_str() {
                self.trace.push(TraceAction {
                    item: item.to_string(),
                    rule: "consumer-token-replacement".to_string(),
                    action: "rewritten".to_string(),
                });
            }
            text = replaced.into_owned();
        }

        if self.limited_evidence {
            text = format!("{LIMITED_DATA_PREFIX}{text}");
        }

        Some(text)
    }

    fn disclaimer_lines(&self, channel: Channel) -> Vec<String> {
        match channel {
            Channel::Interactive | Channel::Api => {
                vec![self.semantics.disclaimers.short.to_string()]
            }
            Channel::DocumentExport => vec![
                self.semantics.disclaimers.export_caveat.to_string(),
                self.semantics.disclaimers.export_full.to_string(),
            ],
        }
    }
}

/// Apply the content-safety gate to narrative text.
///
/// Never fails; the result is always renderable. The action trace is
/// returned for practitioner audiences only.
pub fn apply_guardrails(
    insights: &[String],
    recommendations: &[String],
    audience: Audience,
    channel: Channel,
    evidence: &EvidenceSignals,
    semantics: &Semantics,
) -> GuardrailsResult {
    debug_check_policy_language();

    let mut gate = Gate {
        audience,
        limited_evidence: evidence.total() == 0,
        removed: 0,
        trace: Vec::new(),
        semantics,
    };

    let sanitized_insights: Vec<String> = insights
        .iter()
        .filter_map(|item| gate.sanitize(item))
        .collect();
    let mut sanitized_recommendations: Vec<String> = recommendations
        .iter()
        .filter_map(|item| gate.sanitize(item))
        .collect();
    sanitized_recommendations.extend(gate.disclaimer_lines(channel));

    debug!(
        removed = gate.removed,
        insights = sanitized_insights.len(),
        recommendations = sanitized_recommendations.len(),
        "guardrails applied"
    );

    GuardrailsResult {
        insights: sanitized_insights,
        recommendations: sanitized_recommendations,
        removed_count: gate.removed,
        engine_version: crate::config::ENGINE_VERSION.to_string(),
        semantics_version: semantics.semantics_version.to_string(),
        action_trace: match audience {
            Audience::Practitioner => Some(gate.trace),
            Audience::Consumer => None,
        },
    }
}
