//! Immutable Report Snapshot & Audit Trail
//!
//! A snapshot freezes every computed artifact of one analysis-generation
//! event into a single auditable record. Construction through
//! `SnapshotBuilder` is the only mutation point; the type exposes read
//! accessors and nothing else. A later "edit" is a new additive
//! `PractitionerAnnotation` referencing the snapshot id, never a change to
//! the snapshot.
//!
//! The content hash covers the computed sections only (not id/timestamp),
//! so two generations from identical input hash identically.

use crate::delta::ScoreDeltaExplanation;
use crate::guardrails::{Audience, GuardrailsResult};
use crate::models::{MineralMeasurement, RatioMeasurement, Status};
use crate::oxidation::OxidationClassification;
use crate::scoring::HealthScoreBreakdown;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

/// Patient identity carried on a snapshot (opaque to the engine)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    /// Caller-side patient reference, e.g. a chart id
    pub reference: Option<String>,
    pub display_name: Option<String>,
}

/// The narrative text frozen alongside the sanitized output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeText {
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Category of a practitioner annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationCategory {
    Note,
    StatusOverride,
    Context,
}

/// An additive practitioner-side record referencing a snapshot.
///
/// Never a mutation: annotations accumulate beside the snapshot they
/// target and carry their own client-visibility flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PractitionerAnnotation {
    pub id: String,
    pub snapshot_id: String,
    pub category: AnnotationCategory,
    /// What the annotation points at, e.g. "mineral:Zn" or "score"
    pub target: String,
    pub content: String,
    /// Practitioner-asserted status override for the target, if any
    pub override_status: Option<Status>,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub client_visible: bool,
}

impl PractitionerAnnotation {
    pub fn new(
        snapshot_id: impl Into<String>,
        category: AnnotationCategory,
        target: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            snapshot_id: snapshot_id.into(),
            category,
            target: target.into(),
            content: content.into(),
            override_status: None,
            author: author.into(),
            created_at: now,
            updated_at: now,
            client_visible: false,
        }
    }

    pub fn with_override(mut self, status: Status) -> Self {
        self.override_status = Some(status);
        self
    }

    pub fn visible_to_client(mut self) -> Self {
        self.client_visible = true;
        self
    }
}

/// A structured audit event paired with each snapshot construction.
///
/// Emitted via `tracing` so the hosting process's log pipeline captures
/// it; a persistence collaborator failing to store the event must never
/// discard the computed snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event_type: String,
    pub report_id: String,
    pub timestamp: DateTime<Utc>,
    pub mode: Audience,
}

impl AuditEvent {
    pub fn report_generated(report_id: impl Into<String>, mode: Audience) -> Self {
        Self {
            event_type: "report.generated".to_string(),
            report_id: report_id.into(),
            timestamp: Utc::now(),
            mode,
        }
    }

    /// Emit this audit event via tracing.
    pub fn emit(&self) {
        info!(
            audit.event_type = %self.event_type,
            audit.report_id = %self.report_id,
            audit.timestamp = %self.timestamp.to_rfc3339(),
            audit.mode = ?self.mode,
            "audit event"
        );
    }
}

/// Identity and versioning metadata of one snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub report_id: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    pub semantics_version: String,
    /// Reference-range version the analysis was computed under
    pub range_version_id: String,
    pub mode: Audience,
}

/// The computed sections, serialized for content hashing. Field order is
/// fixed; maps inside are ordered, so the hash is deterministic.
#[derive(Serialize)]
struct ComputedSections<'a> {
    patient: &'a PatientInfo,
    minerals: &'a [MineralMeasurement],
    ratios: &'a [RatioMeasurement],
    score: &'a HealthScoreBreakdown,
    delta: &'a Option<ScoreDeltaExplanation>,
    classification: &'a OxidationClassification,
    guardrails: &'a GuardrailsResult,
    narrative: &'a NarrativeText,
    range_version_id: &'a str,
    engine_version: &'a str,
    semantics_version: &'a str,
}

/// One frozen analysis-generation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSnapshot {
    meta: SnapshotMeta,
    patient: PatientInfo,
    minerals: Vec<MineralMeasurement>,
    ratios: Vec<RatioMeasurement>,
    score: HealthScoreBreakdown,
    delta: Option<ScoreDeltaExplanation>,
    classification: OxidationClassification,
    guardrails: GuardrailsResult,
    narrative: NarrativeText,
    annotations: Vec<PractitionerAnnotation>,
    content_hash: String,
}

impl ReportSnapshot {
    pub fn meta(&self) -> &SnapshotMeta {
        &self.meta
    }

    pub fn report_id(&self) -> &str {
        &self.meta.report_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.meta.created_at
    }

    pub fn patient(&self) -> &PatientInfo {
        &self.patient
    }

    pub fn minerals(&self) -> &[MineralMeasurement] {
        &self.minerals
    }

    pub fn ratios(&self) -> &[RatioMeasurement] {
        &self.ratios
    }

    pub fn score(&self) -> &HealthScoreBreakdown {
        &self.score
    }

    pub fn delta(&self) -> Option<&ScoreDeltaExplanation> {
        self.delta.as_ref()
    }

    pub fn classification(&self) -> &OxidationClassification {
        &self.classification
    }

    pub fn guardrails(&self) -> &GuardrailsResult {
        &self.guardrails
    }

    pub fn narrative(&self) -> &NarrativeText {
        &self.narrative
    }

    pub fn annotations(&self) -> &[PractitionerAnnotation] {
        &self.annotations
    }

    /// Annotations a client-facing export may include.
    pub fn client_visible_annotations(&self) -> Vec<&PractitionerAnnotation> {
        self.annotations.iter().filter(|a| a.client_visible).collect()
    }

    /// Hash of the computed sections; identical input yields an identical
    /// hash across constructions.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

/// The single construction path for snapshots
pub struct SnapshotBuilder {
    patient: PatientInfo,
    range_version_id: String,
    mode: Audience,
    minerals: Vec<MineralMeasurement>,
    ratios: Vec<RatioMeasurement>,
    score: Option<HealthScoreBreakdown>,
    delta: Option<ScoreDeltaExplanation>,
    classification: Option<OxidationClassification>,
    guardrails: Option<GuardrailsResult>,
    narrative: NarrativeText,
    annotations: Vec<PractitionerAnnotation>,
}

/// Error for a builder missing one of its required sections
#[derive(Debug, thiserror::Error)]
#[error("snapshot builder missing required section: {0}")]
pub struct IncompleteSnapshot(&'static str);

impl SnapshotBuilder {
    pub fn new(patient: PatientInfo, range_version_id: impl Into<String>, mode: Audience) -> Self {
        Self {
            patient,
            range_version_id: range_version_id.into(),
            mode,
            minerals: Vec::new(),
            ratios: Vec::new(),
            score: None,
            delta: None,
            classification: None,
            guardrails: None,
            narrative: NarrativeText::default(),
            annotations: Vec::new(),
        }
    }

    pub fn measurements(
        mut self,
        minerals: Vec<MineralMeasurement>,
        ratios: Vec<RatioMeasurement>,
    ) -> Self {
        self.minerals = minerals;
        self.ratios = ratios;
        self
    }

    pub fn score(mut self, score: HealthScoreBreakdown) -> Self {
        self.score = Some(score);
        self
    }

    pub fn delta(mut self, delta: Option<ScoreDeltaExplanation>) -> Self {
        self.delta = delta;
        self
    }

    pub fn classification(mut self, classification: OxidationClassification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn guardrails(mut self, guardrails: GuardrailsResult) -> Self {
        self.guardrails = Some(guardrails);
        self
    }

    pub fn narrative(mut self, narrative: NarrativeText) -> Self {
        self.narrative = narrative;
        self
    }

    pub fn annotations(mut self, annotations: Vec<PractitionerAnnotation>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Freeze the snapshot. Generates the report id and timestamp, hashes
    /// the computed sections, and pairs the record with its audit event.
    pub fn build(self) -> Result<(ReportSnapshot, AuditEvent), IncompleteSnapshot> {
        let score = self.score.ok_or(IncompleteSnapshot("score"))?;
        let classification = self
            .classification
            .ok_or(IncompleteSnapshot("classification"))?;
        let guardrails = self.guardrails.ok_or(IncompleteSnapshot("guardrails"))?;

        let content_hash = hash_sections(&ComputedSections {
            patient: &self.patient,
            minerals: &self.minerals,
            ratios: &self.ratios,
            score: &score,
            delta: &self.delta,
            classification: &classification,
            guardrails: &guardrails,
            narrative: &self.narrative,
            range_version_id: &self.range_version_id,
            engine_version: crate::config::ENGINE_VERSION,
            semantics_version: &score.semantics_version,
        });

        let meta = SnapshotMeta {
            report_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            engine_version: crate::config::ENGINE_VERSION.to_string(),
            semantics_version: score.semantics_version.clone(),
            range_version_id: self.range_version_id,
            mode: self.mode,
        };
        let audit = AuditEvent::report_generated(meta.report_id.clone(), meta.mode);

        let snapshot = ReportSnapshot {
            meta,
            patient: self.patient,
            minerals: self.minerals,
            ratios: self.ratios,
            score,
            delta: self.delta,
            classification,
            guardrails,
            narrative: self.narrative,
            annotations: self.annotations,
            content_hash,
        };
        Ok((snapshot, audit))
    }
}

/// Stable hex digest over the serialized computed sections.
fn hash_sections(sections: &ComputedSections<'_>) -> String {
    // Struct and map serialization order is fixed, so the JSON bytes are a
    // stable identity for the computed content.
    let serialized =
        serde_json::to_vec(sections).unwrap_or_else(|_| b"unserializable-sections".to_vec());
    let digest = Sha256::digest(&serialized);
    format!("{digest:x}")[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Semantics;
    use crate::guardrails::{apply_guardrails, Channel, EvidenceSignals};
    use crate::oxidation::{classify_oxidation, CoreMinerals};
    use crate::registry::{builtin_table, classify_panel};
    use crate::scoring::compose;
    use std::collections::BTreeMap;

    fn build_snapshot(extra_narrative: &str) -> (ReportSnapshot, AuditEvent) {
        let semantics = Semantics::load().expect("semantics");
        let table = builtin_table();
        let values: BTreeMap<String, f64> = table
            .minerals
            .iter()
            .map(|(symbol, range)| (symbol.clone(), range.midpoint()))
            .collect();
        let (minerals, ratios) = classify_panel(&values, &table);
        let score = compose(&minerals, &ratios, semantics);
        let classification = classify_oxidation(&CoreMinerals::from_values(&values), &table);
        let narrative = NarrativeText {
            insights: vec![format!("Pattern reads balanced{extra_narrative}")],
            recommendations: vec!["A varied mineral intake may support this pattern".to_string()],
        };
        let guardrails = apply_guardrails(
            &narrative.insights,
            &narrative.recommendations,
            Audience::Consumer,
            Channel::Interactive,
            &EvidenceSignals {
                abnormal_minerals: 1,
                ..Default::default()
            },
            semantics,
        );
        SnapshotBuilder::new(PatientInfo::default(), "2.1.0", Audience::Consumer)
            .measurements(minerals, ratios)
            .score(score)
            .classification(classification)
            .guardrails(guardrails)
            .narrative(narrative)
            .build()
            .expect("complete builder")
    }

    #[test]
    fn test_round_trip_identical_input_identical_content() {
        let (first, _) = build_snapshot("");
        let (second, _) = build_snapshot("");
        assert_ne!(first.report_id(), second.report_id());
        assert_eq!(first.content_hash(), second.content_hash());
        assert_eq!(first.score().total, second.score().total);
    }

    #[test]
    fn test_changed_input_changes_content_hash() {
        let (first, _) = build_snapshot("");
        let (second, _) = build_snapshot(" with a note");
        assert_ne!(first.content_hash(), second.content_hash());
    }

    #[test]
    fn test_audit_event_pairs_with_snapshot() {
        let (snapshot, audit) = build_snapshot("");
        assert_eq!(audit.report_id, snapshot.report_id());
        assert_eq!(audit.event_type, "report.generated");
        audit.emit();
    }

    #[test]
    fn test_incomplete_builder_is_rejected() {
        let result = SnapshotBuilder::new(PatientInfo::default(), "2.1.0", Audience::Consumer)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_annotations_are_additive_and_filtered() {
        let (snapshot, _) = build_snapshot("");
        let hidden = PractitionerAnnotation::new(
            snapshot.report_id(),
            AnnotationCategory::Note,
            "mineral:Zn",
            "lab re-run requested",
            "practitioner-1",
        );
        let visible = PractitionerAnnotation::new(
            snapshot.report_id(),
            AnnotationCategory::Context,
            "score",
            "sampling period included a dietary change",
            "practitioner-1",
        )
        .visible_to_client();

        // Attaching annotations never mutates the frozen snapshot; a new
        // record is built with them instead.
        assert!(snapshot.annotations().is_empty());
        let annotations = vec![hidden.clone(), visible.clone()];
        assert_eq!(annotations[0].snapshot_id, snapshot.report_id());

        let with_annotations: Vec<&PractitionerAnnotation> =
            annotations.iter().filter(|a| a.client_visible).collect();
        assert_eq!(with_annotations.len(), 1);
        assert_eq!(with_annotations[0].target, "score");
    }

    #[test]
    fn test_override_annotation() {
        let annotation = PractitionerAnnotation::new(
            "report-1",
            AnnotationCategory::StatusOverride,
            "mineral:Ca",
            "re-classified after follow-up sampling",
            "practitioner-2",
        )
        .with_override(Status::Optimal);
        assert_eq!(annotation.override_status, Some(Status::Optimal));
        assert!(!annotation.client_visible);
    }
}
