//! `analyze` command: panel file -> report snapshot

use crate::guardrails::{Audience, Channel};
use crate::pipeline::{InterpretationPipeline, InterpretationRequest};
use crate::registry::ReferenceRangeRegistry;
use crate::reporters::{self, OutputFormat};
use crate::snapshot::{NarrativeText, PatientInfo};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// On-disk panel input
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PanelFile {
    /// Mineral symbol -> concentration
    pub values: BTreeMap<String, f64>,
    /// Symbols actually measured; omitted = trust values as-is
    #[serde(default)]
    pub present: Option<BTreeSet<String>>,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub patient: Option<PatientInfo>,
}

pub(crate) fn read_panel(path: &Path) -> Result<PanelFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading panel file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing panel file {}", path.display()))
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn run(
    registry: &ReferenceRangeRegistry,
    input: &Path,
    format: &str,
    output: Option<&Path>,
    prior: Option<&Path>,
    audience: &str,
    pin_version: Option<String>,
) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    let panel = read_panel(input)?;
    let audience = match audience {
        "practitioner" => Audience::Practitioner,
        _ => Audience::Consumer,
    };
    // Exported documents re-gate on their own channel inside the reporter.
    let channel = match format {
        OutputFormat::Markdown => Channel::DocumentExport,
        OutputFormat::Json => Channel::Api,
        OutputFormat::Text => Channel::Interactive,
    };

    let pipeline = InterpretationPipeline::new(registry)?;
    let prior_state = match prior {
        Some(path) => {
            let prior_panel = read_panel(path)?;
            let prior_request = InterpretationRequest {
                values: prior_panel.values,
                present: prior_panel.present,
                range_version_id: pin_version.clone(),
                ..Default::default()
            };
            Some(pipeline.state_for(&prior_request)?)
        }
        None => None,
    };

    let request = InterpretationRequest {
        values: panel.values,
        present: panel.present,
        prior: prior_state,
        narrative: NarrativeText {
            insights: panel.insights,
            recommendations: panel.recommendations,
        },
        audience,
        channel,
        patient: panel.patient.unwrap_or_default(),
        annotations: Vec::new(),
        range_version_id: pin_version,
    };
    let (snapshot, _audit) = pipeline.interpret(request)?;

    let rendered = reporters::render(&snapshot, format)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
