//! Interpretation pipeline
//!
//! Orchestrates one analysis event end to end:
//!
//! ```text
//! raw panel -> registry (classify) -> composer (score)
//!                                  -> oxidation classifier (pattern)
//! prior analysis ------------------> delta explainer
//! narrative text + evidence ------> guardrails gate
//! everything ---------------------> immutable snapshot + audit event
//! ```
//!
//! Every stage is synchronous and side-effect-free; the pipeline reads a
//! pinned or active range version once and never blocks on I/O. A report
//! is always producible: per-measurement problems degrade to documented
//! fallback statuses inside the stages rather than failing the run.

use crate::config::{ConfigError, Semantics};
use crate::delta::{explain_score_delta, state_from_panel, ScoreDeltaExplanation};
use crate::guardrails::{apply_guardrails, Audience, Channel, EvidenceSignals};
use crate::models::AnalysisState;
use crate::oxidation::{classify_oxidation, CoreMinerals};
use crate::registry::{classify_panel, ReferenceRangeRegistry, RegistryError};
use crate::scoring::compose;
use crate::snapshot::{
    AuditEvent, IncompleteSnapshot, NarrativeText, PatientInfo, PractitionerAnnotation,
    ReportSnapshot, SnapshotBuilder,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can abort an interpretation run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Snapshot(#[from] IncompleteSnapshot),
}

/// One analysis-generation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterpretationRequest {
    /// Flat map of mineral symbols to concentrations; a missing reading
    /// arrives as 0
    pub values: BTreeMap<String, f64>,
    /// Symbols the caller actually measured. When set, values outside the
    /// set are treated as absent (zeroed) instead of trusting an ambiguous
    /// 0 reading.
    #[serde(default)]
    pub present: Option<BTreeSet<String>>,
    /// Prior analysis for delta explanation
    #[serde(default)]
    pub prior: Option<AnalysisState>,
    /// Narrative text to pass through the guardrails gate; rule-generated
    /// and externally generated text alike
    #[serde(default)]
    pub narrative: NarrativeText,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default)]
    pub patient: PatientInfo,
    /// Existing annotations to package with the snapshot
    #[serde(default)]
    pub annotations: Vec<PractitionerAnnotation>,
    /// Pin a specific range version; None uses the active one
    #[serde(default)]
    pub range_version_id: Option<String>,
}

/// The deterministic interpretation pipeline
pub struct InterpretationPipeline<'a> {
    registry: &'a ReferenceRangeRegistry,
    semantics: &'static Semantics,
}

impl<'a> InterpretationPipeline<'a> {
    /// Build a pipeline over a registry. Loads (and on first use,
    /// validates) the locked semantics; config errors are fatal here.
    pub fn new(registry: &'a ReferenceRangeRegistry) -> Result<Self, ConfigError> {
        Ok(Self {
            registry,
            semantics: Semantics::load()?,
        })
    }

    /// Run one full interpretation and freeze the result.
    pub fn interpret(
        &self,
        request: InterpretationRequest,
    ) -> Result<(ReportSnapshot, AuditEvent), PipelineError> {
        let version = match &request.range_version_id {
            Some(id) => self.registry.get(id)?,
            None => self.registry.active_version()?,
        };
        debug!(version = %version.id, "interpreting against range version");

        let values = effective_values(&request.values, request.present.as_ref());
        let (minerals, ratios) = classify_panel(&values, &version.table);
        let score = compose(&minerals, &ratios, self.semantics);
        let classification = classify_oxidation(&CoreMinerals::from_values(&values), &version.table);

        let current_state = state_from_panel(&values, &version.table, self.semantics);
        let delta: Option<ScoreDeltaExplanation> = request
            .prior
            .as_ref()
            .map(|prior| explain_score_delta(prior, &current_state, &version.table, self.semantics));

        let evidence = EvidenceSignals {
            abnormal_minerals: minerals.iter().filter(|m| m.status.is_abnormal()).count(),
            abnormal_ratios: ratios.iter().filter(|r| r.status.is_abnormal()).count(),
            trend_changes: delta
                .as_ref()
                .map(|d| d.drivers.iter().filter(|driver| driver.impact != 0.0).count())
                .unwrap_or(0),
            red_flags: score.red_flags.len(),
        };
        let guardrails = apply_guardrails(
            &request.narrative.insights,
            &request.narrative.recommendations,
            request.audience,
            request.channel,
            &evidence,
            self.semantics,
        );

        let (snapshot, audit) = SnapshotBuilder::new(
            request.patient,
            version.id.clone(),
            request.audience,
        )
        .measurements(minerals, ratios)
        .score(score)
        .delta(delta)
        .classification(classification)
        .guardrails(guardrails)
        .narrative(request.narrative)
        .annotations(request.annotations)
        .build()?;

        // Audit emission is a log-side effect; a collaborator failing to
        // persist it downstream never discards the computed snapshot.
        audit.emit();
        info!(
            report_id = %snapshot.report_id(),
            score = snapshot.score().total,
            archetype = %snapshot.classification().archetype,
            "interpretation complete"
        );
        Ok((snapshot, audit))
    }

    /// The analysis state this request would reduce to, for storing and
    /// later delta comparisons.
    pub fn state_for(
        &self,
        request: &InterpretationRequest,
    ) -> Result<AnalysisState, PipelineError> {
        let version = match &request.range_version_id {
            Some(id) => self.registry.get(id)?,
            None => self.registry.active_version()?,
        };
        let values = effective_values(&request.values, request.present.as_ref());
        Ok(state_from_panel(&values, &version.table, self.semantics))
    }
}

/// Resolve the zero-vs-missing ambiguity: when a presence set is supplied,
/// symbols outside it read as absent (0) regardless of the value map.
fn effective_values(
    values: &BTreeMap<String, f64>,
    present: Option<&BTreeSet<String>>,
) -> BTreeMap<String, f64> {
    match present {
        None => values.clone(),
        Some(present) => values
            .iter()
            .map(|(symbol, value)| {
                let value = if present.contains(symbol) { *value } else { 0.0 };
                (symbol.clone(), value)
            })
            .collect(),
    }
}
